use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cleanup::CleanupSummary;

#[derive(Debug, Serialize)]
struct ReportFile<'a> {
    version: u32,
    generated_at: String,
    #[serde(flatten)]
    summary: &'a CleanupSummary,
}

const REPORT_VERSION: u32 = 1;

/// Writes the run summary as pretty JSON, swapping a temp file into place.
pub fn write_report(summary: &CleanupSummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let report = ReportFile {
        version: REPORT_VERSION,
        generated_at: chrono::Utc::now().to_rfc3339(),
        summary,
    };
    let json = serde_json::to_string_pretty(&report).context("serialize cleanup report")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write cleanup report")?;
    fs::rename(&tmp, path).context("swap cleanup report")?;
    Ok(())
}

/// Human-readable end-of-run summary lines.
pub fn summary_lines(summary: &CleanupSummary) -> Vec<String> {
    let removed_label = if summary.dry_run {
        "Players that would be removed"
    } else {
        "Players removed"
    };
    let mut lines = vec![
        "Cleanup summary".to_string(),
        format!("Mode: {}", if summary.dry_run { "dry run" } else { "execute" }),
    ];
    for stats in &summary.phases {
        lines.push(format!(
            "{}: examined={} groups={} removed={}",
            stats.phase, stats.examined, stats.groups, stats.removed
        ));
    }
    lines.push(format!("{removed_label}: {}", summary.players_removed));
    lines.push(format!("Players updated: {}", summary.players_updated));
    lines.push(format!("Final player count: {}", summary.final_count));
    lines.push(format!(
        "Abbreviated names remaining: {}",
        summary.abbreviated_remaining
    ));
    if summary.abbreviated_remaining > 0 {
        lines.push("  (these might be unique players or need manual review)".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::{Phase, PhaseStats};

    fn summary(dry_run: bool) -> CleanupSummary {
        CleanupSummary {
            dry_run,
            phases: vec![PhaseStats {
                phase: Phase::InvalidNames,
                examined: 2,
                groups: 0,
                removed: 2,
            }],
            players_removed: 2,
            final_count: 10,
            abbreviated_remaining: 1,
            ..CleanupSummary::default()
        }
    }

    #[test]
    fn summary_lines_reflect_mode() {
        let dry = summary_lines(&summary(true));
        assert!(dry.iter().any(|l| l == "Players that would be removed: 2"));
        assert!(dry.iter().any(|l| l.contains("manual review")));

        let exec = summary_lines(&summary(false));
        assert!(exec.iter().any(|l| l == "Players removed: 2"));
        assert!(exec.iter().any(|l| l.starts_with("phase 4 (invalid names)")));
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("cleanup.json");
        write_report(&summary(true), &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["phases"][0]["phase"], "invalid_names");
        assert_eq!(value["players_removed"], 2);
    }
}
