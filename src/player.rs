use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ABBREVIATED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\.\s").expect("abbreviated name pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One player document as the cleanup sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub age: Option<i64>,
}

impl PlayerRecord {
    pub fn new(id: impl Into<String>, name: &str, team: &str, age: Option<i64>) -> Self {
        Self {
            id: PlayerId::new(id),
            name: Some(name.to_string()),
            team: team.to_string(),
            age,
        }
    }

    pub fn name_str(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    // Missing ages compare as 0.
    pub fn age_or_zero(&self) -> i64 {
        self.age.unwrap_or(0)
    }

    pub fn age_diff(&self, other: &PlayerRecord) -> u64 {
        self.age_or_zero().abs_diff(other.age_or_zero())
    }

    pub fn is_abbreviated(&self) -> bool {
        is_abbreviated_name(self.name_str())
    }

    pub fn has_invalid_name(&self) -> bool {
        self.name.as_deref().is_none_or(|name| name.trim().is_empty())
    }
}

/// `"J. Silva"` style names: one uppercase letter, a period, then whitespace.
pub fn is_abbreviated_name(name: &str) -> bool {
    ABBREVIATED_NAME.is_match(name)
}

pub fn abbreviated_name_pattern() -> &'static Regex {
    &ABBREVIATED_NAME
}
