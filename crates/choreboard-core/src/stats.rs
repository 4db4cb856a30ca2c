//! Aggregate statistics derived from the history log.
//!
//! Nothing here is stored as a source of truth; totals are always recomputed
//! by summing history entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::household::Member;

/// Totals for one user over some slice of history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_points: u64,
    pub completed_count: u64,
}

impl UserStats {
    pub fn record(&mut self, entry: &HistoryEntry) {
        self.total_points += u64::from(entry.points);
        self.completed_count += 1;
    }
}

/// Totals for `user_id` over `entries`.
pub fn aggregate_for<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
    user_id: &str,
) -> UserStats {
    let mut stats = UserStats::default();
    for entry in entries.into_iter().filter(|e| e.user_id == user_id) {
        stats.record(entry);
    }
    stats
}

/// Totals for every user appearing in `entries`.
pub fn aggregate_by_user<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
) -> BTreeMap<String, UserStats> {
    let mut totals: BTreeMap<String, UserStats> = BTreeMap::new();
    for entry in entries {
        totals.entry(entry.user_id.clone()).or_default().record(entry);
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub display_name: String,
    #[serde(flatten)]
    pub stats: UserStats,
}

/// Per-member totals, highest points first, then by display name.
///
/// Members without completions are listed with zeros. Completions by users
/// who have since left the household are not shown.
pub fn leaderboard<'a>(
    entries: impl IntoIterator<Item = &'a HistoryEntry>,
    members: &[Member],
) -> Vec<LeaderboardRow> {
    let totals = aggregate_by_user(entries);
    let mut rows: Vec<LeaderboardRow> = members
        .iter()
        .map(|m| LeaderboardRow {
            user_id: m.user_id.clone(),
            display_name: m.display_name.clone(),
            stats: totals.get(&m.user_id).copied().unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.stats
            .total_points
            .cmp(&a.stats.total_points)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(user: &str, points: u32) -> HistoryEntry {
        HistoryEntry {
            id: 0,
            household_id: "h".into(),
            task_id: "t".into(),
            task_name: "Dishes".into(),
            user_id: user.into(),
            user_name: user.into(),
            completed_at: Utc::now(),
            points,
        }
    }

    fn member(id: &str, name: &str) -> Member {
        Member {
            household_id: "h".into(),
            user_id: id.into(),
            display_name: name.into(),
        }
    }

    #[test]
    fn aggregate_sums_points_and_counts() {
        let entries = vec![entry("a", 10), entry("b", 3), entry("a", 7)];
        let stats = aggregate_for(&entries, "a");
        assert_eq!(stats.total_points, 17);
        assert_eq!(stats.completed_count, 2);
        assert_eq!(aggregate_for(&entries, "zed"), UserStats::default());
    }

    #[test]
    fn aggregate_by_user_covers_everyone() {
        let entries = vec![entry("a", 10), entry("b", 3), entry("a", 7)];
        let totals = aggregate_by_user(&entries);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals["b"].total_points, 3);
    }

    #[test]
    fn leaderboard_orders_by_points_then_name() {
        let entries = vec![entry("a", 10), entry("b", 10), entry("c", 30)];
        let members = vec![
            member("a", "Zoe"),
            member("b", "Ada"),
            member("c", "Cy"),
            member("d", "Dee"),
        ];
        let rows = leaderboard(&entries, &members);
        let names: Vec<&str> = rows.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Ada", "Zoe", "Dee"]);
        assert_eq!(rows[3].stats.completed_count, 0);
    }
}
