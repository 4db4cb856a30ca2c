//! # Choreboard Core Library
//!
//! Task-completion and gamification engine for a shared household chore
//! list. Every operation is reachable from the `choreboard` CLI; a UI layer
//! is expected to call the same library.
//!
//! ## Architecture
//!
//! - **History**: append-only completion log, the only source of points
//! - **Rewards**: pure calculation of base points times situational bonuses
//! - **Completion**: at-most-once task completion under concurrent sessions
//! - **Achievements**: a registry of 150+ declarative rules with a monotonic
//!   unlocked set per household
//! - **Rotation**: atomic close-out of a scoring period into an archive
//!
//! ## Key Components
//!
//! - [`HouseholdDb`]: SQLite store; completion, cascade delete and rotation
//!   each run in one immediate transaction
//! - [`HouseholdSession`]: async facade with conflict retry and debounced
//!   achievement evaluation
//! - [`compute_reward`]: the reward calculator
//! - [`AchievementEngine`]: evaluates an [`AchievementBook`] against a
//!   [`RuleContext`]
//! - [`Config`]: TOML configuration

pub mod achievements;
pub mod calendar;
pub mod error;
pub mod history;
pub mod household;
pub mod reward;
pub mod session;
pub mod stats;
pub mod storage;
pub mod task;

pub use achievements::{
    AchievementBook, AchievementEngine, AchievementNotice, AchievementRule, Criterion, Debouncer,
    RuleContext,
};
pub use error::{
    CompletionError, ConfigError, CoreError, DatabaseError, DeleteError, ValidationError,
};
pub use history::{HistoryEntry, NewHistoryEntry};
pub use household::{ArchivedPeriod, Household, Member, RotationOutcome};
pub use reward::{compute_reward, Bonus, ChoreCategory, Reward, RewardPolicy};
pub use session::HouseholdSession;
pub use stats::{LeaderboardRow, UserStats};
pub use storage::{
    data_dir, CompletionReceipt, Config, DeleteSummary, HouseholdDb, Reversion, StoreOptions,
    UnlockRecord,
};
pub use task::{Assignee, Task, TaskState, TaskUpdate};
