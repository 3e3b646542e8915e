use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::CleanupConfig;
use crate::grouping::{
    MatchRule, forward_scan_groups, partition_by_surname, partition_by_team, select_best_version,
};
use crate::player::{PlayerId, PlayerRecord, abbreviated_name_pattern};
use crate::store::{PlayerFilter, PlayerStore};

/// Surname groups bigger than this are too ambiguous to resolve automatically.
pub const MAX_SURNAME_GROUP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Abbreviated,
    SameTeam,
    Surname,
    InvalidNames,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Abbreviated,
        Phase::SameTeam,
        Phase::Surname,
        Phase::InvalidNames,
    ];

    pub fn number(self) -> u8 {
        match self {
            Phase::Abbreviated => 1,
            Phase::SameTeam => 2,
            Phase::Surname => 3,
            Phase::InvalidNames => 4,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Phase::ALL.into_iter().find(|p| p.number() == n)
    }

    /// Parses `"1,2,4"` style lists. Order and repeats are normalised away.
    pub fn parse_list(raw: &str) -> Result<Vec<Phase>> {
        let mut out = Vec::new();
        for part in raw.split([',', ';', ' ']).map(str::trim).filter(|s| !s.is_empty()) {
            let phase = part
                .parse::<u8>()
                .ok()
                .and_then(Phase::from_number)
                .ok_or_else(|| anyhow!("unknown cleanup phase {part:?} (expected 1-4)"))?;
            out.push(phase);
        }
        if out.is_empty() {
            return Err(anyhow!("no cleanup phases selected"));
        }
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    pub fn list_label(phases: &[Phase]) -> String {
        phases
            .iter()
            .map(|p| p.number().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Abbreviated => "abbreviated vs full names",
            Phase::SameTeam => "same-team name variants",
            Phase::Surname => "shared surnames",
            Phase::InvalidNames => "invalid names",
        };
        write!(f, "phase {} ({label})", self.number())
    }
}

/// Context attached to the error of an aborted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupAborted {
    pub phase: Phase,
    pub removed: usize,
}

impl fmt::Display for CleanupAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cleanup aborted during {} after removing {} players",
            self.phase, self.removed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupDecision {
    pub phase: Phase,
    /// Team or surname the group was found under.
    pub key: String,
    pub kept: PlayerRecord,
    pub removed: Vec<PlayerRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseStats {
    pub phase: Phase,
    pub examined: usize,
    pub groups: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub dry_run: bool,
    pub phases: Vec<PhaseStats>,
    pub decisions: Vec<GroupDecision>,
    /// Removed, or planned for removal when `dry_run` is set.
    pub players_removed: usize,
    pub players_updated: usize,
    pub invalid_names: Vec<PlayerId>,
    pub final_count: usize,
    pub abbreviated_remaining: usize,
}

impl CleanupSummary {
    pub fn removed_in(&self, phase: Phase) -> usize {
        self.phases
            .iter()
            .find(|s| s.phase == phase)
            .map(|s| s.removed)
            .unwrap_or(0)
    }
}

/// Runs the selected phases in order against `store`.
///
/// The first store error aborts the run; the error carries the number of
/// players removed before it happened. Nothing is deleted while
/// `config.dry_run` is set, but planned removals are still hidden from later
/// phases so the report matches what an executing run would do.
pub fn run_cleanup<S: PlayerStore>(store: &mut S, config: &CleanupConfig) -> Result<CleanupSummary> {
    let mut cleanup = Cleanup {
        store,
        dry_run: config.dry_run,
        removed: HashSet::new(),
        summary: CleanupSummary {
            dry_run: config.dry_run,
            ..CleanupSummary::default()
        },
    };

    let mut phases = config.phases.clone();
    phases.sort_unstable();
    phases.dedup();

    let mut last_phase = None;
    for phase in phases {
        info!("{phase}: starting");
        if let Err(err) = cleanup.run_phase(phase) {
            let removed = cleanup.summary.players_removed;
            warn!(removed, "{phase}: aborted");
            return Err(err.context(CleanupAborted { phase, removed }));
        }
        last_phase = Some(phase);
    }

    if let Err(err) = cleanup.finish() {
        let removed = cleanup.summary.players_removed;
        warn!(removed, "final count failed");
        let Some(phase) = last_phase else {
            return Err(err);
        };
        return Err(err.context(CleanupAborted { phase, removed }));
    }
    Ok(cleanup.summary)
}

struct Cleanup<'s, S: PlayerStore> {
    store: &'s mut S,
    dry_run: bool,
    removed: HashSet<PlayerId>,
    summary: CleanupSummary,
}

impl<S: PlayerStore> Cleanup<'_, S> {
    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        let mut stats = PhaseStats {
            phase,
            examined: 0,
            groups: 0,
            removed: 0,
        };
        match phase {
            Phase::Abbreviated => self.abbreviated_phase(&mut stats)?,
            Phase::SameTeam => self.same_team_phase(&mut stats)?,
            Phase::Surname => self.surname_phase(&mut stats)?,
            Phase::InvalidNames => self.invalid_names_phase(&mut stats)?,
        }
        info!(
            examined = stats.examined,
            groups = stats.groups,
            removed = stats.removed,
            "{phase}: done"
        );
        self.summary.phases.push(stats);
        Ok(())
    }

    fn abbreviated_phase(&mut self, stats: &mut PhaseStats) -> Result<()> {
        let abbreviated = self.available(PlayerFilter::with_regex(
            abbreviated_name_pattern().clone(),
        ))?;
        info!("found {} abbreviated names to check", abbreviated.len());
        stats.examined = abbreviated.len();

        for player in abbreviated {
            let Some(filter) = full_name_filter(&player)? else {
                continue;
            };
            let matches = self.available(filter)?;
            let Some(full) = matches.into_iter().next() else {
                continue;
            };
            info!(
                "removing abbreviated {:?} in favour of {:?} ({})",
                player.name_str(),
                full.name_str(),
                player.team
            );
            self.remove(&player, stats)?;
            stats.groups += 1;
            self.summary.decisions.push(GroupDecision {
                phase: Phase::Abbreviated,
                key: player.team.clone(),
                kept: full,
                removed: vec![player],
            });
        }
        Ok(())
    }

    fn same_team_phase(&mut self, stats: &mut PhaseStats) -> Result<()> {
        let players = self.named_players()?;
        stats.examined = players.len();
        let refs = players.iter().collect::<Vec<_>>();

        for (team, members) in partition_by_team(&refs) {
            if members.len() <= 1 {
                continue;
            }
            for group in forward_scan_groups(&members, MatchRule::SAME_TEAM) {
                let group = group.iter().map(|&i| members[i]).collect::<Vec<_>>();
                self.resolve_group(Phase::SameTeam, &team, &group, stats)?;
            }
        }
        Ok(())
    }

    fn surname_phase(&mut self, stats: &mut PhaseStats) -> Result<()> {
        let players = self.named_players()?;
        stats.examined = players.len();
        let refs = players.iter().collect::<Vec<_>>();

        for (surname, members) in partition_by_surname(&refs) {
            if members.len() <= 1 || members.len() > MAX_SURNAME_GROUP {
                continue;
            }
            tracing::debug!("checking surname {surname:?} with {} players", members.len());
            for group in forward_scan_groups(&members, MatchRule::SAME_SURNAME) {
                let group = group.iter().map(|&i| members[i]).collect::<Vec<_>>();
                self.resolve_group(Phase::Surname, &surname, &group, stats)?;
            }
        }
        Ok(())
    }

    fn invalid_names_phase(&mut self, stats: &mut PhaseStats) -> Result<()> {
        let filter = PlayerFilter::invalid_names();
        let invalid = self.available(filter.clone())?;
        stats.examined = invalid.len();
        if invalid.is_empty() {
            return Ok(());
        }

        let removed = if self.dry_run {
            info!("would remove {} players with invalid names", invalid.len());
            invalid.len()
        } else {
            info!("removing {} players with invalid names", invalid.len());
            self.store
                .delete_many(&filter)
                .context("bulk delete players with invalid names")?
        };

        for player in invalid {
            self.removed.insert(player.id.clone());
            self.summary.invalid_names.push(player.id);
        }
        stats.removed += removed;
        self.summary.players_removed += removed;
        Ok(())
    }

    fn resolve_group(
        &mut self,
        phase: Phase,
        key: &str,
        group: &[&PlayerRecord],
        stats: &mut PhaseStats,
    ) -> Result<()> {
        let Some(best) = select_best_version(group) else {
            return Ok(());
        };
        let kept = group[best];
        info!("duplicate group under {key:?} ({} players)", group.len());
        for player in group {
            info!(
                "   {:?} | {} | age {} | id {}",
                player.name_str(),
                player.team,
                player.age.map(|a| a.to_string()).unwrap_or_else(|| "?".to_string()),
                player.id
            );
        }
        info!("   keeping {:?}", kept.name_str());

        let mut removed = Vec::with_capacity(group.len() - 1);
        for (idx, player) in group.iter().enumerate() {
            if idx == best {
                continue;
            }
            self.remove(player, stats)?;
            removed.push((*player).clone());
        }
        stats.groups += 1;
        self.summary.decisions.push(GroupDecision {
            phase,
            key: key.to_string(),
            kept: kept.clone(),
            removed,
        });
        Ok(())
    }

    fn remove(&mut self, player: &PlayerRecord, stats: &mut PhaseStats) -> Result<()> {
        if !self.dry_run {
            let existed = self
                .store
                .delete_by_id(&player.id)
                .with_context(|| format!("delete player {} ({:?})", player.id, player.name_str()))?;
            if !existed {
                warn!("player {} was already gone", player.id);
            }
        }
        self.removed.insert(player.id.clone());
        stats.removed += 1;
        self.summary.players_removed += 1;
        Ok(())
    }

    /// Store rows matching `filter` that this run has not removed.
    fn available(&self, filter: PlayerFilter) -> Result<Vec<PlayerRecord>> {
        let rows = self.store.find(&filter).context("query players")?;
        Ok(rows
            .into_iter()
            .filter(|p| !self.removed.contains(&p.id))
            .collect())
    }

    // Blank names are left to the invalid-name phase.
    fn named_players(&self) -> Result<Vec<PlayerRecord>> {
        Ok(self
            .available(PlayerFilter::all())?
            .into_iter()
            .filter(|p| !p.has_invalid_name())
            .collect())
    }

    fn finish(&mut self) -> Result<()> {
        self.summary.final_count = self
            .store
            .count(&PlayerFilter::all())
            .context("count players")?;
        self.summary.abbreviated_remaining = self
            .available(PlayerFilter::with_regex(abbreviated_name_pattern().clone()))?
            .len();
        Ok(())
    }
}

/// Store filter for the full-name counterpart of an abbreviated player:
/// same initial followed by letters, same trailing name, same team, age
/// within one year. `None` when the name has a single token.
pub fn full_name_filter(player: &PlayerRecord) -> Result<Option<PlayerFilter>> {
    let name = player.name_str();
    let parts = name.split(' ').collect::<Vec<_>>();
    if parts.len() < 2 {
        return Ok(None);
    }
    let initial = parts[0].replacen('.', "", 1);
    let rest = parts[1..].join(" ");
    let pattern = format!(
        "^{}[a-zA-Z]+.*{}$",
        regex::escape(&initial),
        regex::escape(&rest)
    );
    let age = player.age_or_zero();
    let filter = PlayerFilter::name_matches(&pattern, true)?
        .excluding_name(name)
        .in_team(&player.team)
        .aged_between(age.saturating_sub(1), age.saturating_add(1));
    Ok(Some(filter))
}
