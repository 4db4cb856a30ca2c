//! Reward calculation: base points times situational bonuses.
//!
//! [`compute_reward`] is a pure function of its inputs. The completion
//! transaction calls it with history read inside the same transaction and
//! persists the result on the new history entry.
//!
//! ## Bonuses
//!
//! | Bonus | Default | Active when |
//! |-------|---------|-------------|
//! | Momentum | ×1.5 | ≥2 completions by the user in the trailing 2 hours |
//! | Affinity | ×1.25 | the user's previous completion shares a category |
//! | First of day | ×2.0 | no completion by the user yet today (local day) |
//!
//! Multipliers stack in that order and the product is floored.

pub mod category;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::local_date;
use crate::history::HistoryEntry;
use crate::storage::Config;
use crate::task::Task;

pub use category::{categories_of, share_category, ChoreCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bonus {
    Momentum,
    Affinity,
    FirstOfDay,
}

impl Bonus {
    pub fn label(self) -> &'static str {
        match self {
            Bonus::Momentum => "Momentum",
            Bonus::Affinity => "Affinity",
            Bonus::FirstOfDay => "First of the day",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedBonus {
    pub bonus: Bonus,
    pub multiplier: f64,
}

/// Final award for one completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub base_points: u32,
    pub final_points: u32,
    pub applied_bonuses: Vec<AppliedBonus>,
}

impl Reward {
    pub fn has(&self, bonus: Bonus) -> bool {
        self.applied_bonuses.iter().any(|b| b.bonus == bonus)
    }
}

/// Multipliers and windows used by [`compute_reward`].
#[derive(Debug, Clone, PartialEq)]
pub struct RewardPolicy {
    pub momentum_multiplier: f64,
    pub momentum_window: Duration,
    pub momentum_min_completions: usize,
    pub affinity_multiplier: f64,
    pub first_of_day_multiplier: f64,
    pub utc_offset: FixedOffset,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RewardPolicy {
    pub fn from_config(config: &Config) -> Self {
        let reward = &config.reward;
        Self {
            momentum_multiplier: reward.momentum_multiplier,
            momentum_window: Duration::minutes(i64::from(reward.momentum_window_minutes)),
            momentum_min_completions: reward.momentum_min_completions as usize,
            affinity_multiplier: reward.affinity_multiplier,
            first_of_day_multiplier: reward.first_of_day_multiplier,
            utc_offset: config.utc_offset(),
        }
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

/// Compute the award for `user_id` completing `task` at `now`.
///
/// `recent_events` may hold the whole household history; only entries by the
/// acting user at or before `now` count. `all_tasks` resolves the current
/// name of the previously completed chore, falling back to the name copied
/// onto its history entry.
pub fn compute_reward(
    policy: &RewardPolicy,
    task: &Task,
    recent_events: &[HistoryEntry],
    all_tasks: &[Task],
    user_id: &str,
    now: DateTime<Utc>,
) -> Reward {
    let mine: Vec<&HistoryEntry> = recent_events
        .iter()
        .filter(|e| e.user_id == user_id && e.completed_at <= now)
        .collect();

    let mut applied = Vec::new();

    let window_start = now - policy.momentum_window;
    let in_window = mine.iter().filter(|e| e.completed_at >= window_start).count();
    if in_window >= policy.momentum_min_completions.max(1) {
        applied.push(AppliedBonus {
            bonus: Bonus::Momentum,
            multiplier: policy.momentum_multiplier,
        });
    }

    let previous = mine
        .iter()
        .max_by(|a, b| a.completed_at.cmp(&b.completed_at).then(a.id.cmp(&b.id)));
    if let Some(previous) = previous {
        let previous_name = all_tasks
            .iter()
            .find(|t| t.id == previous.task_id)
            .map(|t| t.name.as_str())
            .unwrap_or(previous.task_name.as_str());
        if share_category(previous_name, &task.name) {
            applied.push(AppliedBonus {
                bonus: Bonus::Affinity,
                multiplier: policy.affinity_multiplier,
            });
        }
    }

    let today = local_date(now, policy.utc_offset);
    let done_today = mine
        .iter()
        .any(|e| local_date(e.completed_at, policy.utc_offset) == today);
    if !done_today {
        applied.push(AppliedBonus {
            bonus: Bonus::FirstOfDay,
            multiplier: policy.first_of_day_multiplier,
        });
    }

    let product: f64 = applied.iter().map(|b| b.multiplier).product();
    let scaled = (f64::from(task.points) * product).floor();
    let final_points = if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    };

    Reward {
        base_points: task.points,
        final_points,
        applied_bonuses: applied,
    }
}
