use std::collections::HashMap;

use crate::name_match::name_similarity;
use crate::player::PlayerRecord;

/// Pairwise duplicate predicate. Teams must be equal, ages within
/// `max_age_diff`, and name similarity strictly above `min_similarity`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRule {
    pub max_age_diff: u64,
    pub min_similarity: f64,
}

impl MatchRule {
    pub const SAME_TEAM: MatchRule = MatchRule {
        max_age_diff: 1,
        min_similarity: 0.8,
    };

    pub const SAME_SURNAME: MatchRule = MatchRule {
        max_age_diff: 0,
        min_similarity: 0.9,
    };

    pub fn is_duplicate(&self, a: &PlayerRecord, b: &PlayerRecord) -> bool {
        if a.team != b.team {
            return false;
        }
        if a.age_diff(b) > self.max_age_diff {
            return false;
        }
        name_similarity(a.name_str(), b.name_str()) > self.min_similarity
    }
}

/// Single forward scan: each unprocessed seed collects later unprocessed
/// records that match the seed or any record already collected for it.
/// Groups of one are dropped. Returned indices are in scan order, seed first.
pub fn forward_scan_groups(players: &[&PlayerRecord], rule: MatchRule) -> Vec<Vec<usize>> {
    let mut processed = vec![false; players.len()];
    let mut groups = Vec::new();

    for seed in 0..players.len() {
        if processed[seed] {
            continue;
        }
        let mut members = vec![seed];
        for candidate in (seed + 1)..players.len() {
            if processed[candidate] {
                continue;
            }
            let joins = members
                .iter()
                .any(|&m| rule.is_duplicate(players[m], players[candidate]));
            if joins {
                members.push(candidate);
            }
        }
        if members.len() > 1 {
            for &m in &members {
                processed[m] = true;
            }
            groups.push(members);
        }
    }

    groups
}

/// Left fold picking the record to keep: non-abbreviated beats abbreviated,
/// then the longer name, then whoever was held first.
pub fn select_best_version(group: &[&PlayerRecord]) -> Option<usize> {
    if group.is_empty() {
        return None;
    }
    let mut best = 0usize;
    for current in 1..group.len() {
        if prefers(group[current], group[best]) {
            best = current;
        }
    }
    Some(best)
}

fn prefers(current: &PlayerRecord, best: &PlayerRecord) -> bool {
    let best_abbrev = best.is_abbreviated();
    let current_abbrev = current.is_abbreviated();
    if best_abbrev != current_abbrev {
        return best_abbrev;
    }
    current.name_str().chars().count() > best.name_str().chars().count()
}

/// Groups records by exact team label, preserving first-seen order.
pub fn partition_by_team<'a>(players: &[&'a PlayerRecord]) -> Vec<(String, Vec<&'a PlayerRecord>)> {
    partition_by(players, |p| Some(p.team.clone()))
}

/// Last space-separated token of the trimmed name, when it looks like a
/// surname (more than two characters, leading ASCII capital).
pub fn surname_of(name: &str) -> Option<&str> {
    let parts = name.trim().split(' ').collect::<Vec<_>>();
    if parts.len() < 2 {
        return None;
    }
    let surname = parts[parts.len() - 1];
    let capitalised = surname.chars().next().is_some_and(|ch| ch.is_ascii_uppercase());
    (surname.chars().count() > 2 && capitalised).then_some(surname)
}

pub fn partition_by_surname<'a>(
    players: &[&'a PlayerRecord],
) -> Vec<(String, Vec<&'a PlayerRecord>)> {
    partition_by(players, |p| surname_of(p.name_str()).map(|s| s.to_string()))
}

fn partition_by<'a>(
    players: &[&'a PlayerRecord],
    key_of: impl Fn(&PlayerRecord) -> Option<String>,
) -> Vec<(String, Vec<&'a PlayerRecord>)> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<(String, Vec<&'a PlayerRecord>)> = Vec::new();
    for &player in players {
        let Some(key) = key_of(player) else {
            continue;
        };
        match slots.get(&key) {
            Some(&slot) => out[slot].1.push(player),
            None => {
                slots.insert(key.clone(), out.len());
                out.push((key, vec![player]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str, name: &str, team: &str, age: Option<i64>) -> PlayerRecord {
        PlayerRecord::new(id, name, team, age)
    }

    #[test]
    fn selector_prefers_full_names() {
        let a = p("1", "J. Silva", "X", Some(24));
        let b = p("2", "Joao Silva", "X", Some(24));
        assert_eq!(select_best_version(&[&a, &b]), Some(1));
        assert_eq!(select_best_version(&[&b, &a]), Some(0));
    }

    #[test]
    fn selector_prefers_longer_then_first() {
        let a = p("1", "Joao Silva", "X", None);
        let b = p("2", "Joao Silva Santos", "X", None);
        assert_eq!(select_best_version(&[&a, &b]), Some(1));

        let c = p("3", "Joao Silvb", "X", None);
        assert_eq!(select_best_version(&[&a, &c]), Some(0));
        assert_eq!(select_best_version(&[&c, &a]), Some(0));
    }

    #[test]
    fn selector_abbreviation_outranks_length() {
        let a = p("1", "J. Silva Santos Junior", "X", None);
        let b = p("2", "Jo Silva", "X", None);
        assert_eq!(select_best_version(&[&a, &b]), Some(1));
        assert_eq!(select_best_version(&[]), None);
    }

    #[test]
    fn same_team_rule_checks_age_window() {
        let a = p("1", "Joao Silva", "X", Some(24));
        let b = p("2", "Joao Silvaa", "X", Some(25));
        let c = p("3", "Joao Silva", "X", Some(27));
        let d = p("4", "Joao Silva", "Y", Some(24));
        assert!(MatchRule::SAME_TEAM.is_duplicate(&a, &b));
        assert!(!MatchRule::SAME_TEAM.is_duplicate(&a, &c));
        assert!(!MatchRule::SAME_TEAM.is_duplicate(&a, &d));
        assert!(!MatchRule::SAME_SURNAME.is_duplicate(&a, &b));
    }

    #[test]
    fn extreme_ages_do_not_overflow_rules() {
        let old = p("1", "Joao Silva", "X", Some(i64::MAX));
        let young = p("2", "Joao Silva", "X", Some(-1));
        let oldest = p("3", "Joao Silva", "X", Some(i64::MAX));
        assert!(!MatchRule::SAME_TEAM.is_duplicate(&old, &young));
        assert!(!MatchRule::SAME_SURNAME.is_duplicate(&young, &old));
        assert!(MatchRule::SAME_SURNAME.is_duplicate(&old, &oldest));
    }

    #[test]
    fn forward_scan_joins_through_collected_members() {
        // b matches a, c only matches b (age 26 is two away from a).
        let a = p("1", "Joao Silva", "X", Some(24));
        let b = p("2", "Joao Silvaa", "X", Some(25));
        let c = p("3", "Joao Silvaa", "X", Some(26));
        let groups = forward_scan_groups(&[&a, &b, &c], MatchRule::SAME_TEAM);
        assert_eq!(groups, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn forward_scan_drops_unmatched_seeds() {
        let a = p("1", "Joao Silva", "X", Some(30));
        let b = p("2", "Pedro Costa", "X", Some(24));
        let c = p("3", "Pedro Costaa", "X", Some(24));
        let groups = forward_scan_groups(&[&a, &b, &c], MatchRule::SAME_TEAM);
        assert_eq!(groups, vec![vec![1, 2]]);
    }

    #[test]
    fn surname_requires_capital_and_length() {
        assert_eq!(surname_of("Joao Silva"), Some("Silva"));
        assert_eq!(surname_of("  Joao Silva  "), Some("Silva"));
        assert_eq!(surname_of("Neymar"), None);
        assert_eq!(surname_of("Son Ng"), None);
        assert_eq!(surname_of("Ruben dias"), None);
    }

    #[test]
    fn partitions_keep_first_seen_order() {
        let a = p("1", "A Alpha", "Y", None);
        let b = p("2", "B Beta", "X", None);
        let c = p("3", "C Alpha", "Y", None);
        let teams = partition_by_team(&[&a, &b, &c]);
        assert_eq!(teams[0].0, "Y");
        assert_eq!(teams[0].1.len(), 2);
        assert_eq!(teams[1].0, "X");

        let surnames = partition_by_surname(&[&a, &b, &c]);
        assert_eq!(surnames[0].0, "Alpha");
        assert_eq!(surnames[0].1.len(), 2);
    }
}
