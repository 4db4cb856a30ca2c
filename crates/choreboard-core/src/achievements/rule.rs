//! Achievement rule descriptors and the criteria they test.
//!
//! A rule is plain data: an id, display metadata and a [`Criterion`]. The
//! criterion is evaluated against a [`RuleContext`]; it never reads the clock
//! or the store, so the same context always yields the same answer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{local_date, local_hour, local_weekday};
use crate::history::{by_user, within, HistoryEntry};
use crate::household::Member;
use crate::reward::ChoreCategory;
use crate::stats::UserStats;
use crate::task::Task;

/// Completions before this local hour count as early.
pub const EARLY_BIRD_BEFORE_HOUR: u32 = 8;
/// Completions at or after this local hour count as late.
pub const NIGHT_OWL_FROM_HOUR: u32 = 22;

/// Everything a criterion may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Acting user's totals for the current period.
    pub stats: &'a UserStats,
    /// Household history, oldest first.
    pub events: &'a [HistoryEntry],
    pub tasks: &'a [Task],
    pub members: &'a [Member],
    pub user_id: &'a str,
    pub period_start: DateTime<Utc>,
    pub utc_offset: FixedOffset,
}

impl<'a> RuleContext<'a> {
    pub fn my_events(&self) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        by_user(self.events, self.user_id)
    }

    pub fn period_events(&self) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        within(self.events, self.period_start, None)
    }

    fn task(&self, task_id: &str) -> Option<&'a Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    fn my_local_dates(&self) -> BTreeSet<NaiveDate> {
        self.my_events()
            .map(|e| local_date(e.completed_at, self.utc_offset))
            .collect()
    }
}

/// What has to be true for a rule to unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    /// Completions in the current period.
    PeriodCompletions { count: u64 },
    /// Points in the current period.
    PeriodPoints { points: u64 },
    LifetimeCompletions { count: u64 },
    LifetimePoints { points: u64 },
    /// Longest run of consecutive local days with a completion.
    DayStreak { days: u64 },
    /// Most completions on a single local day.
    BusiestDay { count: u64 },
    CategoryCompletions { category: ChoreCategory, count: u64 },
    EarlyBird { count: u64 },
    NightOwl { count: u64 },
    Weekend { count: u64 },
    /// Different chores (by task id) completed.
    DistinctChores { count: u64 },
    /// One completion worth at least this many points.
    BigGrant { points: u64 },
    /// Completions of chores assigned to another member.
    HelpingHand { count: u64 },
    /// Completions on the chore's scheduled weekday.
    OnSchedule { count: u64 },
    /// Strictly most points in the period among at least two members.
    TopContributor,
    /// Every member completed something this period.
    FullHouse,
    /// Every live chore is completed.
    CleanSweep,
    /// Completions on all seven weekdays.
    EveryWeekday,
}

impl Criterion {
    pub fn is_met(&self, ctx: &RuleContext<'_>) -> bool {
        match *self {
            Criterion::PeriodCompletions { count } => ctx.stats.completed_count >= count,
            Criterion::PeriodPoints { points } => ctx.stats.total_points >= points,
            Criterion::LifetimeCompletions { count } => ctx.my_events().count() as u64 >= count,
            Criterion::LifetimePoints { points } => {
                ctx.my_events().map(|e| u64::from(e.points)).sum::<u64>() >= points
            }
            Criterion::DayStreak { days } => longest_streak(&ctx.my_local_dates()) >= days,
            Criterion::BusiestDay { count } => busiest_day(ctx) >= count,
            Criterion::CategoryCompletions { category, count } => {
                ctx.my_events().filter(|e| category.matches(&e.task_name)).count() as u64 >= count
            }
            Criterion::EarlyBird { count } => {
                ctx.my_events()
                    .filter(|e| local_hour(e.completed_at, ctx.utc_offset) < EARLY_BIRD_BEFORE_HOUR)
                    .count() as u64
                    >= count
            }
            Criterion::NightOwl { count } => {
                ctx.my_events()
                    .filter(|e| local_hour(e.completed_at, ctx.utc_offset) >= NIGHT_OWL_FROM_HOUR)
                    .count() as u64
                    >= count
            }
            Criterion::Weekend { count } => {
                ctx.my_events()
                    .filter(|e| {
                        matches!(local_weekday(e.completed_at, ctx.utc_offset), Weekday::Sat | Weekday::Sun)
                    })
                    .count() as u64
                    >= count
            }
            Criterion::DistinctChores { count } => {
                ctx.my_events().map(|e| e.task_id.as_str()).collect::<BTreeSet<_>>().len() as u64 >= count
            }
            Criterion::BigGrant { points } => ctx.my_events().any(|e| u64::from(e.points) >= points),
            Criterion::HelpingHand { count } => {
                ctx.my_events()
                    .filter(|e| ctx.task(&e.task_id).is_some_and(|t| t.is_assigned_to_other(ctx.user_id)))
                    .count() as u64
                    >= count
            }
            Criterion::OnSchedule { count } => {
                ctx.my_events()
                    .filter(|e| {
                        ctx.task(&e.task_id)
                            .is_some_and(|t| t.day == local_weekday(e.completed_at, ctx.utc_offset))
                    })
                    .count() as u64
                    >= count
            }
            Criterion::TopContributor => top_contributor(ctx),
            Criterion::FullHouse => {
                let active: BTreeSet<&str> = ctx.period_events().map(|e| e.user_id.as_str()).collect();
                ctx.members.len() >= 2 && ctx.members.iter().all(|m| active.contains(m.user_id.as_str()))
            }
            Criterion::CleanSweep => !ctx.tasks.is_empty() && ctx.tasks.iter().all(|t| t.completed),
            Criterion::EveryWeekday => {
                ctx.my_events()
                    .map(|e| local_weekday(e.completed_at, ctx.utc_offset).num_days_from_monday())
                    .collect::<BTreeSet<_>>()
                    .len()
                    == 7
            }
        }
    }
}

fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u64 {
    let mut best = 0u64;
    let mut run = 0u64;
    let mut previous: Option<NaiveDate> = None;
    for &date in dates {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(date) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(date);
    }
    best
}

fn busiest_day(ctx: &RuleContext<'_>) -> u64 {
    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for e in ctx.my_events() {
        *per_day.entry(local_date(e.completed_at, ctx.utc_offset)).or_default() += 1;
    }
    per_day.values().copied().max().unwrap_or(0)
}

fn top_contributor(ctx: &RuleContext<'_>) -> bool {
    if ctx.members.len() < 2 || ctx.stats.total_points == 0 {
        return false;
    }
    let mut points: BTreeMap<&str, u64> = BTreeMap::new();
    for e in ctx.period_events() {
        *points.entry(e.user_id.as_str()).or_default() += u64::from(e.points);
    }
    ctx.members
        .iter()
        .filter(|m| m.user_id != ctx.user_id)
        .all(|m| points.get(m.user_id.as_str()).copied().unwrap_or(0) < ctx.stats.total_points)
}

/// One achievement: identity, display metadata and its criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRule {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Position within a tier family, starting at 1.
    pub tier: Option<u32>,
    pub criterion: Criterion,
}

impl AchievementRule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        criterion: Criterion,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tier: None,
            criterion,
        }
    }

    pub fn holds(&self, ctx: &RuleContext<'_>) -> bool {
        self.criterion.is_met(ctx)
    }
}
