use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::player::{PlayerId, PlayerRecord};

/// Conjunction of predicates over player records. Empty filter matches all.
#[derive(Debug, Clone, Default)]
pub struct PlayerFilter {
    pub name_pattern: Option<Regex>,
    pub name_not: Option<String>,
    pub team: Option<String>,
    /// Inclusive; missing ages compare as 0.
    pub age_range: Option<(i64, i64)>,
    pub invalid_name: bool,
}

impl PlayerFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn name_matches(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .with_context(|| format!("invalid name pattern {pattern:?}"))?;
        Ok(Self {
            name_pattern: Some(regex),
            ..Self::default()
        })
    }

    pub fn with_regex(regex: Regex) -> Self {
        Self {
            name_pattern: Some(regex),
            ..Self::default()
        }
    }

    pub fn invalid_names() -> Self {
        Self {
            invalid_name: true,
            ..Self::default()
        }
    }

    pub fn excluding_name(mut self, name: &str) -> Self {
        self.name_not = Some(name.to_string());
        self
    }

    pub fn in_team(mut self, team: &str) -> Self {
        self.team = Some(team.to_string());
        self
    }

    pub fn aged_between(mut self, min: i64, max: i64) -> Self {
        self.age_range = Some((min, max));
        self
    }

    pub fn matches(&self, player: &PlayerRecord) -> bool {
        if let Some(regex) = &self.name_pattern {
            let Some(name) = player.name.as_deref() else {
                return false;
            };
            if !regex.is_match(name) {
                return false;
            }
        }
        if let Some(excluded) = &self.name_not
            && player.name.as_deref() == Some(excluded.as_str())
        {
            return false;
        }
        if let Some(team) = &self.team
            && player.team != *team
        {
            return false;
        }
        if let Some((min, max)) = self.age_range {
            let age = player.age_or_zero();
            if age < min || age > max {
                return false;
            }
        }
        if self.invalid_name && !player.has_invalid_name() {
            return false;
        }
        true
    }
}

/// Record store the cleanup reads from and deletes out of.
pub trait PlayerStore {
    /// Matching records in store order.
    fn find(&self, filter: &PlayerFilter) -> Result<Vec<PlayerRecord>>;

    /// `Ok(false)` when the id was already gone.
    fn delete_by_id(&mut self, id: &PlayerId) -> Result<bool>;

    fn delete_many(&mut self, filter: &PlayerFilter) -> Result<usize>;

    fn count(&self, filter: &PlayerFilter) -> Result<usize>;
}

/// Vec-backed store used by tests and dry runs over exported documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlayerStore {
    players: Vec<PlayerRecord>,
    deleted: Vec<PlayerId>,
    fail_deletes_for: Option<PlayerId>,
    fail_counts: bool,
}

impl MemoryPlayerStore {
    pub fn new(players: Vec<PlayerRecord>) -> Self {
        Self {
            players,
            ..Self::default()
        }
    }

    pub fn players(&self) -> &[PlayerRecord] {
        &self.players
    }

    /// Ids removed so far, in deletion order.
    pub fn deleted(&self) -> &[PlayerId] {
        &self.deleted
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.iter().any(|p| p.id.as_str() == id)
    }

    /// Makes the next delete of `id` fail, to exercise abort handling.
    pub fn fail_delete_of(&mut self, id: &str) {
        self.fail_deletes_for = Some(PlayerId::new(id));
    }

    /// Makes every `count` call fail.
    pub fn fail_counts(&mut self) {
        self.fail_counts = true;
    }
}

impl PlayerStore for MemoryPlayerStore {
    fn find(&self, filter: &PlayerFilter) -> Result<Vec<PlayerRecord>> {
        Ok(self
            .players
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    fn delete_by_id(&mut self, id: &PlayerId) -> Result<bool> {
        if self.fail_deletes_for.as_ref() == Some(id) {
            return Err(anyhow::anyhow!("delete rejected for player {id}"));
        }
        let before = self.players.len();
        self.players.retain(|p| &p.id != id);
        let removed = self.players.len() != before;
        if removed {
            self.deleted.push(id.clone());
        }
        Ok(removed)
    }

    fn delete_many(&mut self, filter: &PlayerFilter) -> Result<usize> {
        let ids = self
            .players
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.id.clone())
            .collect::<Vec<_>>();
        for id in &ids {
            self.delete_by_id(id)?;
        }
        Ok(ids.len())
    }

    fn count(&self, filter: &PlayerFilter) -> Result<usize> {
        if self.fail_counts {
            return Err(anyhow::anyhow!("count rejected"));
        }
        Ok(self.players.iter().filter(|p| filter.matches(p)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryPlayerStore {
        MemoryPlayerStore::new(vec![
            PlayerRecord::new("1", "Joao Silva", "X", Some(24)),
            PlayerRecord::new("2", "J. Silva", "X", Some(25)),
            PlayerRecord::new("3", "Pedro Silva", "Y", None),
            PlayerRecord::new("4", "  ", "Y", Some(30)),
        ])
    }

    #[test]
    fn filter_combines_predicates() {
        let store = sample();
        let filter = PlayerFilter::name_matches("silva$", true)
            .unwrap()
            .in_team("X")
            .aged_between(23, 24);
        let rows = store.find(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_str(), "1");
    }

    #[test]
    fn missing_age_filters_as_zero() {
        let store = sample();
        let rows = store
            .find(&PlayerFilter::all().aged_between(-1, 1))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_str(), "3");
    }

    #[test]
    fn excluding_name_skips_exact_match() {
        let store = sample();
        let rows = store
            .find(&PlayerFilter::all().in_team("X").excluding_name("J. Silva"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_str(), "1");
    }

    #[test]
    fn delete_by_id_is_idempotent() {
        let mut store = sample();
        let id = PlayerId::new("1");
        assert!(store.delete_by_id(&id).unwrap());
        assert!(!store.delete_by_id(&id).unwrap());
        assert_eq!(store.count(&PlayerFilter::all()).unwrap(), 3);
    }

    #[test]
    fn delete_many_removes_invalid_names() {
        let mut store = sample();
        assert_eq!(store.delete_many(&PlayerFilter::invalid_names()).unwrap(), 1);
        assert!(!store.contains("4"));
    }
}
