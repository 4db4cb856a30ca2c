//! Coalesces achievement evaluation requests.
//!
//! Every completion schedules an evaluation for its (household, user) pair.
//! Scheduling the same key again pushes its due time back, so a burst of
//! completions ends in one evaluation once the burst has been quiet for the
//! debounce window.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::storage::Config;

/// Key used by sessions: (household id, user id).
pub type EvaluationKey = (String, String);

#[derive(Debug, Clone)]
pub struct Debouncer<K: Ord + Clone> {
    window: Duration,
    pending: BTreeMap<K, DateTime<Utc>>,
}

impl<K: Ord + Clone> Debouncer<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::zero()),
            pending: BTreeMap::new(),
        }
    }

    /// Window from `achievements.debounce_ms`; values past what a
    /// `Duration` holds saturate at its maximum.
    pub fn from_config(config: &Config) -> Self {
        let window = i64::try_from(config.achievements.debounce_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX);
        Self::new(window)
    }

    /// Request work for `key`, due one window after `now`. A due time past
    /// the representable range is clamped to the latest instant.
    pub fn schedule(&mut self, key: K, now: DateTime<Utc>) {
        let due = now
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.pending.insert(key, due);
    }

    /// Remove and return every key whose due time is at or before `now`.
    pub fn drain_due(&mut self, now: DateTime<Utc>) -> Vec<K> {
        let mut ready = Vec::new();
        self.pending.retain(|key, due| {
            if *due <= now {
                ready.push(key.clone());
                false
            } else {
                true
            }
        });
        ready
    }

    /// Earliest pending due time.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.values().min().copied()
    }

    /// Time left until the earliest key is due, zero if one is overdue.
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_due().map(|due| (due - now).max(Duration::zero()))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
