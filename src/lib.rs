pub mod cleanup;
pub mod config;
pub mod documents;
pub mod grouping;
pub mod name_match;
pub mod player;
pub mod report;
pub mod sqlite_store;
pub mod store;
