//! Achievement rules, the built-in catalog and the evaluator.

pub mod catalog;
pub mod debounce;
pub mod engine;
pub mod rule;

pub use catalog::{standard_rules, AchievementBook, TierFamily};
pub use debounce::{Debouncer, EvaluationKey};
pub use engine::{evaluate, newly_unlocked, AchievementEngine, AchievementNotice};
pub use rule::{AchievementRule, Criterion, RuleContext, EARLY_BIRD_BEFORE_HOUR, NIGHT_OWL_FROM_HOUR};
