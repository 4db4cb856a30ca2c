//! Achievement evaluation.
//!
//! [`evaluate`] is a single linear scan over the registry: every rule not yet
//! unlocked is tested independently against the same context. Persisting the
//! result is a set union done by the store, so evaluating twice, or from two
//! sessions at once, converges on the same unlocked set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::achievements::catalog::AchievementBook;
use crate::achievements::rule::{AchievementRule, RuleContext};

/// Display data for a newly unlocked achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementNotice {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&AchievementRule> for AchievementNotice {
    fn from(rule: &AchievementRule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            description: rule.description.clone(),
        }
    }
}

/// Rules that hold for `ctx` and are not in `already_unlocked`, in registry order.
pub fn evaluate<'r>(
    rules: &'r [AchievementRule],
    ctx: &RuleContext<'_>,
    already_unlocked: &BTreeSet<String>,
) -> Vec<&'r AchievementRule> {
    rules
        .iter()
        .filter(|rule| !already_unlocked.contains(&rule.id))
        .filter(|rule| rule.holds(ctx))
        .collect()
}

/// Ids of the rules [`evaluate`] would return.
pub fn newly_unlocked(
    rules: &[AchievementRule],
    ctx: &RuleContext<'_>,
    already_unlocked: &BTreeSet<String>,
) -> BTreeSet<String> {
    evaluate(rules, ctx, already_unlocked)
        .into_iter()
        .map(|rule| rule.id.clone())
        .collect()
}

/// Evaluator bound to one registry.
#[derive(Debug, Clone, Default)]
pub struct AchievementEngine {
    book: AchievementBook,
}

impl AchievementEngine {
    pub fn new(book: AchievementBook) -> Self {
        Self { book }
    }

    pub fn book(&self) -> &AchievementBook {
        &self.book
    }

    pub fn evaluate(
        &self,
        ctx: &RuleContext<'_>,
        already_unlocked: &BTreeSet<String>,
    ) -> Vec<AchievementNotice> {
        evaluate(self.book.rules(), ctx, already_unlocked)
            .into_iter()
            .map(AchievementNotice::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::offset_from_minutes;
    use crate::history::HistoryEntry;
    use crate::household::Member;
    use crate::stats::{aggregate_for, UserStats};
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn history(count: usize) -> Vec<HistoryEntry> {
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        (0..count)
            .map(|i| HistoryEntry {
                id: i as i64 + 1,
                household_id: "h".into(),
                task_id: format!("t{}", i % 4),
                task_name: "Wash dishes".into(),
                user_id: "ana".into(),
                user_name: "Ana".into(),
                completed_at: start + Duration::hours(i as i64 * 5),
                points: 10,
            })
            .collect()
    }

    fn members() -> Vec<Member> {
        vec![Member {
            household_id: "h".into(),
            user_id: "ana".into(),
            display_name: "Ana".into(),
        }]
    }

    fn run(book: &AchievementBook, events: &[HistoryEntry], unlocked: &BTreeSet<String>) -> BTreeSet<String> {
        let stats: UserStats = aggregate_for(events, "ana");
        let members = members();
        let ctx = RuleContext {
            stats: &stats,
            events,
            tasks: &[],
            members: &members,
            user_id: "ana",
            period_start: Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
            utc_offset: offset_from_minutes(0),
        };
        newly_unlocked(book.rules(), &ctx, unlocked)
    }

    #[test]
    fn jumping_past_several_tiers_unlocks_each_of_them() {
        let book = AchievementBook::standard();
        let unlocked = run(&book, &history(4), &BTreeSet::new());
        assert!(unlocked.contains("period_chores_3"));
        assert!(!unlocked.contains("period_chores_5"));

        let next = run(&book, &history(12), &unlocked);
        assert!(next.contains("period_chores_5"));
        assert!(next.contains("period_chores_10"));
        assert!(!next.contains("period_chores_15"));
        assert!(!next.contains("period_chores_3"), "already unlocked ids are not reported again");
    }

    #[test]
    fn second_evaluation_without_new_events_is_empty() {
        let book = AchievementBook::standard();
        let events = history(7);
        let unlocked = run(&book, &events, &BTreeSet::new());
        assert!(!unlocked.is_empty());
        assert!(run(&book, &events, &unlocked).is_empty());
    }

    #[test]
    fn engine_reports_display_data() {
        let engine = AchievementEngine::default();
        let events = history(1);
        let stats = aggregate_for(&events, "ana");
        let members = members();
        let ctx = RuleContext {
            stats: &stats,
            events: &events,
            tasks: &[],
            members: &members,
            user_id: "ana",
            period_start: Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap(),
            utc_offset: offset_from_minutes(0),
        };
        let notices = engine.evaluate(&ctx, &BTreeSet::new());
        let first = notices.iter().find(|n| n.id == "period_chores_1").unwrap();
        assert_eq!(first.name, "Busy Week I");
        assert!(!first.description.is_empty());
    }

    proptest! {
        #[test]
        fn unlocked_set_only_grows(batches in proptest::collection::vec(1usize..6, 1..6)) {
            let book = AchievementBook::standard();
            let mut unlocked = BTreeSet::new();
            let mut total = 0;
            for batch in batches {
                total += batch;
                let before = unlocked.clone();
                let fresh = run(&book, &history(total), &unlocked);
                prop_assert!(fresh.is_disjoint(&before));
                unlocked.extend(fresh);
                prop_assert!(before.is_subset(&unlocked));
                prop_assert!(run(&book, &history(total), &unlocked).is_empty());
            }
        }
    }
}
