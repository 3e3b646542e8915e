use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::cleanup::Phase;

/// Settings for one cleanup run. Defaults to a dry run of every phase.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupConfig {
    /// Nothing is deleted unless this is explicitly turned off.
    pub dry_run: bool,
    pub phases: Vec<Phase>,
    pub db_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            phases: Phase::ALL.to_vec(),
            db_path: None,
            report_path: None,
        }
    }
}

impl CleanupConfig {
    pub fn executing() -> Self {
        Self {
            dry_run: false,
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `DEDUP_DB`, `DEDUP_EXECUTE`, `DEDUP_PHASES` and `DEDUP_REPORT`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(raw) = non_empty(lookup("DEDUP_DB")) {
            cfg.db_path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = non_empty(lookup("DEDUP_EXECUTE")) {
            let execute = parse_bool(&raw)
                .ok_or_else(|| anyhow!("DEDUP_EXECUTE must be a boolean, got {raw:?}"))?;
            cfg.dry_run = !execute;
        }
        if let Some(raw) = non_empty(lookup("DEDUP_PHASES")) {
            cfg.phases = Phase::parse_list(&raw)?;
        }
        if let Some(raw) = non_empty(lookup("DEDUP_REPORT")) {
            cfg.report_path = Some(PathBuf::from(raw));
        }
        Ok(cfg)
    }

    /// Applies the command-line mode flags. `dry_run` wins over `execute`
    /// and over `DEDUP_EXECUTE`.
    pub fn apply_mode_flags(&mut self, execute: bool, dry_run: bool) {
        if execute {
            self.dry_run = false;
        }
        if dry_run {
            self.dry_run = true;
        }
    }
}

/// Loads `.env.local` then `.env`; missing files are fine.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
