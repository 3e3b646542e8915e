use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use transferiq_dedup::cleanup::{CleanupAborted, CleanupSummary, Phase, run_cleanup};
use transferiq_dedup::config::{self, CleanupConfig};
use transferiq_dedup::report;
use transferiq_dedup::sqlite_store::{self, SqlitePlayerStore};

#[derive(Parser, Debug)]
#[command(name = "transferiq_dedup")]
#[command(about = "Find and remove duplicate player records", long_about = None)]
struct Cli {
    /// Sqlite player database (defaults to DEDUP_DB or the user cache dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Delete records instead of only reporting them
    #[arg(long, conflicts_with = "dry_run")]
    execute: bool,

    /// Only report, even when DEDUP_EXECUTE is set
    #[arg(long)]
    dry_run: bool,

    /// Phases to run, e.g. "1,2,4"
    #[arg(long)]
    phases: Option<String>,

    /// Write a JSON report of every decision to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> ExitCode {
    config::load_dotenv();
    config::init_tracing();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("error during cleanup: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = resolve_config(cli)?;
    let db_path = cfg
        .db_path
        .clone()
        .or_else(sqlite_store::default_db_path)
        .context("unable to resolve sqlite path")?;

    if cfg.dry_run {
        warn!("dry run: nothing will be deleted (pass --execute to apply)");
    } else {
        warn!("this run permanently removes duplicate players; make sure a backup exists");
    }

    let mut store = SqlitePlayerStore::open(&db_path)?;
    info!("connected to {}", db_path.display());

    let outcome = run_recorded(&mut store, &cfg);
    let closed = store.close();
    info!("disconnected from {}", db_path.display());

    let summary = outcome?;
    closed?;

    println!("DB: {}", db_path.display());
    for line in report::summary_lines(&summary) {
        println!("{line}");
    }
    if let Some(path) = cfg.report_path.as_deref() {
        report::write_report(&summary, path)?;
        println!("Report: {}", path.display());
    }
    Ok(())
}

fn resolve_config(cli: Cli) -> Result<CleanupConfig> {
    let mut cfg = CleanupConfig::from_env()?;
    if let Some(db) = cli.db {
        cfg.db_path = Some(db);
    }
    cfg.apply_mode_flags(cli.execute, cli.dry_run);
    if let Some(raw) = cli.phases.as_deref() {
        cfg.phases = Phase::parse_list(raw)?;
    }
    if let Some(path) = cli.report {
        cfg.report_path = Some(path);
    }
    Ok(cfg)
}

fn run_recorded(store: &mut SqlitePlayerStore, cfg: &CleanupConfig) -> Result<CleanupSummary> {
    let run_id = store.begin_run(cfg.dry_run, &Phase::list_label(&cfg.phases))?;
    match run_cleanup(store, cfg) {
        Ok(summary) => {
            store.finish_run(
                run_id,
                summary.players_removed,
                Some(summary.final_count),
                None,
            )?;
            Ok(summary)
        }
        Err(err) => {
            let removed = err
                .downcast_ref::<CleanupAborted>()
                .map(|a| a.removed)
                .unwrap_or(0);
            if let Err(audit_err) =
                store.finish_run(run_id, removed, None, Some(&format!("{err:#}")))
            {
                warn!("failed to record aborted run: {audit_err:#}");
            }
            Err(err)
        }
    }
}
