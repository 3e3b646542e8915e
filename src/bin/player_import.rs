use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

use transferiq_dedup::config::{self, CleanupConfig};
use transferiq_dedup::documents::parse_player_documents_json;
use transferiq_dedup::player::is_abbreviated_name;
use transferiq_dedup::sqlite_store::{self, SqlitePlayerStore};
use transferiq_dedup::store::{PlayerFilter, PlayerStore};

/// Load an exported JSON array of player documents into the sqlite store.
#[derive(Parser, Debug)]
#[command(name = "player_import")]
struct Cli {
    /// JSON file with player documents
    input: PathBuf,

    /// Sqlite player database (defaults to DEDUP_DB or the user cache dir)
    #[arg(long)]
    db: Option<PathBuf>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let cli = Cli::parse();

    let db_path = cli
        .db
        .or(CleanupConfig::from_env()?.db_path)
        .or_else(sqlite_store::default_db_path)
        .context("unable to resolve sqlite path")?;

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("read {}", cli.input.display()))?;
    let docs = parse_player_documents_json(&raw)?;
    if docs.is_empty() {
        return Err(anyhow!("no player documents in {}", cli.input.display()));
    }

    let mut store = SqlitePlayerStore::open(&db_path)?;
    let upserted = store.upsert_documents(&docs)?;
    info!("upserted {upserted} players");
    let total = store.count(&PlayerFilter::all())?;
    store.close()?;

    let abbreviated = docs
        .iter()
        .filter(|d| d.record.name.as_deref().is_some_and(is_abbreviated_name))
        .count();
    let invalid = docs.iter().filter(|d| d.record.has_invalid_name()).count();

    println!("Player import complete");
    println!("DB: {}", db_path.display());
    println!("Players upserted: {upserted}");
    println!("Players in store: {total}");
    println!("Abbreviated names in input: {abbreviated}");
    println!("Invalid names in input: {invalid}");
    Ok(())
}
