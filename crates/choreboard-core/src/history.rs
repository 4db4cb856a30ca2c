//! Completion history: the append-only event log.
//!
//! Each [`HistoryEntry`] records one successful completion. Entries carry a
//! copy of the task name so they stay readable after the task is renamed or
//! deleted; the task id is a plain back-reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completion, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Insertion order within the store; breaks timestamp ties.
    pub id: i64,
    pub household_id: String,
    pub task_id: String,
    pub task_name: String,
    pub user_id: String,
    pub user_name: String,
    pub completed_at: DateTime<Utc>,
    /// Points actually awarded, bonuses included.
    pub points: u32,
}

/// An entry about to be appended; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub household_id: String,
    pub task_id: String,
    pub task_name: String,
    pub user_id: String,
    pub user_name: String,
    pub completed_at: DateTime<Utc>,
    pub points: u32,
}

impl NewHistoryEntry {
    pub fn into_entry(self, id: i64) -> HistoryEntry {
        HistoryEntry {
            id,
            household_id: self.household_id,
            task_id: self.task_id,
            task_name: self.task_name,
            user_id: self.user_id,
            user_name: self.user_name,
            completed_at: self.completed_at,
            points: self.points,
        }
    }
}

/// Order entries by timestamp, then by insertion order.
pub fn sort_chronologically(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| a.completed_at.cmp(&b.completed_at).then(a.id.cmp(&b.id)));
}

/// Entries by `user_id`, in the order given.
pub fn by_user<'a>(
    entries: &'a [HistoryEntry],
    user_id: &'a str,
) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
    entries.iter().filter(move |e| e.user_id == user_id)
}

/// Entries in the half-open window `[from, until)`.
pub fn within<'a>(
    entries: &'a [HistoryEntry],
    from: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
    entries
        .iter()
        .filter(move |e| e.completed_at >= from && until.map_or(true, |u| e.completed_at < u))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: i64, user: &str, minute: u32) -> HistoryEntry {
        HistoryEntry {
            id,
            household_id: "h".into(),
            task_id: format!("t{id}"),
            task_name: "Dishes".into(),
            user_id: user.into(),
            user_name: user.to_uppercase(),
            completed_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
            points: 5,
        }
    }

    #[test]
    fn ties_are_broken_by_insertion_order() {
        let mut entries = vec![entry(3, "a", 5), entry(1, "a", 5), entry(2, "b", 1)];
        sort_chronologically(&mut entries);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn window_is_half_open() {
        let entries = vec![entry(1, "a", 0), entry(2, "a", 10), entry(3, "a", 20)];
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let until = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 0).unwrap();
        let ids: Vec<i64> = within(&entries, from, Some(until)).map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(within(&entries, from, None).count(), 3);
    }

    #[test]
    fn by_user_filters() {
        let entries = vec![entry(1, "a", 0), entry(2, "b", 1), entry(3, "a", 2)];
        assert_eq!(by_user(&entries, "a").count(), 2);
    }
}
