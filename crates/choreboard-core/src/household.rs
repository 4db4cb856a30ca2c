//! Households, members, and archived scoring periods.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;
use crate::stats::UserStats;

/// Isolation boundary: one task list, one scoring period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub id: String,
    pub name: String,
    /// Start of the current scoring period.
    pub period_start: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub household_id: String,
    pub user_id: String,
    pub display_name: String,
}

/// Snapshot written by a rotation. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedPeriod {
    pub id: i64,
    pub household_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Every completion in `[period_start, period_end)`.
    pub events: Vec<HistoryEntry>,
    /// Final per-user totals for the period, keyed by user id.
    pub stats: BTreeMap<String, UserStats>,
}

/// Result of `rotate_period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "archive", rename_all = "snake_case")]
pub enum RotationOutcome {
    Archived(ArchivedPeriod),
    /// Nothing was completed in the period; no state changed.
    NoOp,
}

impl RotationOutcome {
    pub fn archive(&self) -> Option<&ArchivedPeriod> {
        match self {
            RotationOutcome::Archived(archive) => Some(archive),
            RotationOutcome::NoOp => None,
        }
    }
}
