//! The achievement registry and the families it is built from.
//!
//! Most achievements come in ordered tiers of one base rule ("complete N
//! chores" for N in 1, 3, 5, ...). A [`TierFamily`] turns one template into
//! one independent [`AchievementRule`] per threshold, with ids of the form
//! `<family>_<threshold>`.

use std::collections::HashSet;

use crate::achievements::rule::{AchievementRule, Criterion};
use crate::error::ValidationError;
use crate::reward::ChoreCategory;

const TIER_LABELS: [&str; 12] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
];

/// Template for a tiered achievement family.
#[derive(Debug, Clone)]
pub struct TierFamily {
    key: String,
    title: String,
    thresholds: Vec<u64>,
    criterion: fn(u64) -> Criterion,
    describe: fn(u64) -> String,
}

impl TierFamily {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        criterion: fn(u64) -> Criterion,
        describe: fn(u64) -> String,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            thresholds: Vec::new(),
            criterion,
            describe,
        }
    }

    /// Thresholds in ascending order; duplicates are dropped.
    pub fn tiers(mut self, thresholds: &[u64]) -> Self {
        let mut sorted = thresholds.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        self.thresholds = sorted;
        self
    }

    /// One rule per threshold, in ascending order.
    pub fn build(&self) -> Vec<AchievementRule> {
        self.thresholds
            .iter()
            .enumerate()
            .map(|(index, &threshold)| {
                let label = TIER_LABELS
                    .get(index)
                    .map(|l| (*l).to_string())
                    .unwrap_or_else(|| (index + 1).to_string());
                AchievementRule {
                    id: format!("{}_{}", self.key, threshold),
                    name: format!("{} {}", self.title, label),
                    description: (self.describe)(threshold),
                    tier: Some(index as u32 + 1),
                    criterion: (self.criterion)(threshold),
                }
            })
            .collect()
    }
}

/// Injected, immutable list of rules with unique ids.
#[derive(Debug, Clone)]
pub struct AchievementBook {
    rules: Vec<AchievementRule>,
}

impl AchievementBook {
    /// # Errors
    /// Returns an error if two rules share an id.
    pub fn new(rules: Vec<AchievementRule>) -> Result<Self, ValidationError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(ValidationError::Duplicate {
                    kind: "achievement",
                    id: rule.id.clone(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        Self {
            rules: standard_rules(),
        }
    }

    pub fn rules(&self) -> &[AchievementRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&AchievementRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for AchievementBook {
    fn default() -> Self {
        Self::standard()
    }
}

fn plural(n: u64, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Tier families of the built-in catalog, without the per-category ones.
pub fn standard_families() -> Vec<TierFamily> {
    vec![
        TierFamily::new(
            "period_chores",
            "Busy Week",
            |count| Criterion::PeriodCompletions { count },
            |n| format!("Complete {} in a single week", plural(n, "chore", "chores")),
        )
        .tiers(&[1, 3, 5, 10, 15, 20, 25, 30, 40, 50, 75, 100]),
        TierFamily::new(
            "period_points",
            "Point Haul",
            |points| Criterion::PeriodPoints { points },
            |n| format!("Earn {n} points in a single week"),
        )
        .tiers(&[10, 25, 50, 100, 150, 200, 300, 500, 750, 1000, 1500, 2000]),
        TierFamily::new(
            "lifetime_chores",
            "Chore Veteran",
            |count| Criterion::LifetimeCompletions { count },
            |n| format!("Complete {n} chores in total"),
        )
        .tiers(&[10, 25, 50, 100, 200, 300, 500, 750, 1000, 2000]),
        TierFamily::new(
            "lifetime_points",
            "Point Hoarder",
            |points| Criterion::LifetimePoints { points },
            |n| format!("Earn {n} points in total"),
        )
        .tiers(&[100, 250, 500, 1000, 2500, 5000, 10000, 25000, 50000, 100000]),
        TierFamily::new(
            "streak",
            "On a Roll",
            |days| Criterion::DayStreak { days },
            |n| format!("Complete a chore on {n} days in a row"),
        )
        .tiers(&[2, 3, 5, 7, 10, 14, 21, 30, 60, 100]),
        TierFamily::new(
            "busiest_day",
            "Whirlwind",
            |count| Criterion::BusiestDay { count },
            |n| format!("Complete {n} chores in one day"),
        )
        .tiers(&[3, 5, 8, 10, 15, 20, 25, 30]),
        TierFamily::new(
            "early_bird",
            "Early Bird",
            |count| Criterion::EarlyBird { count },
            |n| format!("Complete {} before 8am", plural(n, "chore", "chores")),
        )
        .tiers(&[1, 5, 10, 25, 50]),
        TierFamily::new(
            "night_owl",
            "Night Owl",
            |count| Criterion::NightOwl { count },
            |n| format!("Complete {} after 10pm", plural(n, "chore", "chores")),
        )
        .tiers(&[1, 5, 10, 25, 50]),
        TierFamily::new(
            "weekend",
            "Weekend Warrior",
            |count| Criterion::Weekend { count },
            |n| format!("Complete {} on a weekend", plural(n, "chore", "chores")),
        )
        .tiers(&[1, 5, 10, 25, 50, 100]),
        TierFamily::new(
            "variety",
            "Jack of All Trades",
            |count| Criterion::DistinctChores { count },
            |n| format!("Complete {n} different chores"),
        )
        .tiers(&[3, 5, 10, 20, 30, 50]),
        TierFamily::new(
            "big_grant",
            "Jackpot",
            |points| Criterion::BigGrant { points },
            |n| format!("Earn {n} points from a single chore"),
        )
        .tiers(&[10, 20, 30, 50, 75, 100]),
        TierFamily::new(
            "helping_hand",
            "Helping Hand",
            |count| Criterion::HelpingHand { count },
            |n| format!("Complete {} assigned to someone else", plural(n, "chore", "chores")),
        )
        .tiers(&[1, 3, 5, 10, 25]),
        TierFamily::new(
            "on_schedule",
            "Right on Time",
            |count| Criterion::OnSchedule { count },
            |n| format!("Complete {} on its scheduled day", plural(n, "chore", "chores")),
        )
        .tiers(&[1, 5, 10, 25, 50]),
    ]
}

fn category_family(category: ChoreCategory) -> TierFamily {
    let family = match category {
        ChoreCategory::Kitchen => TierFamily::new(
            "kitchen",
            "Kitchen Hero",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Kitchen, count },
            |n| format!("Complete {} in the kitchen", plural(n, "chore", "chores")),
        ),
        ChoreCategory::Bathroom => TierFamily::new(
            "bathroom",
            "Porcelain Polisher",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Bathroom, count },
            |n| format!("Complete {} in the bathroom", plural(n, "chore", "chores")),
        ),
        ChoreCategory::Laundry => TierFamily::new(
            "laundry",
            "Laundry Legend",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Laundry, count },
            |n| format!("Complete {}", plural(n, "laundry chore", "laundry chores")),
        ),
        ChoreCategory::Floors => TierFamily::new(
            "floors",
            "Floor Master",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Floors, count },
            |n| format!("Vacuum, mop or sweep {}", plural(n, "time", "times")),
        ),
        ChoreCategory::Trash => TierFamily::new(
            "trash",
            "Bin Boss",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Trash, count },
            |n| format!("Take care of the trash {}", plural(n, "time", "times")),
        ),
        ChoreCategory::Outdoor => TierFamily::new(
            "outdoor",
            "Green Thumb",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Outdoor, count },
            |n| format!("Complete {} outdoors", plural(n, "chore", "chores")),
        ),
        ChoreCategory::Pets => TierFamily::new(
            "pets",
            "Pet Pal",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Pets, count },
            |n| format!("Look after the pets {}", plural(n, "time", "times")),
        ),
        ChoreCategory::Errands => TierFamily::new(
            "errands",
            "Errand Runner",
            |count| Criterion::CategoryCompletions { category: ChoreCategory::Errands, count },
            |n| format!("Run {}", plural(n, "errand", "errands")),
        ),
    };
    family.tiers(&[1, 5, 10, 25, 50, 100])
}

fn standalone_rules() -> Vec<AchievementRule> {
    vec![
        AchievementRule::new(
            "top_contributor",
            "MVP",
            "Earn the most points in the household this week",
            Criterion::TopContributor,
        ),
        AchievementRule::new(
            "full_house",
            "Full House",
            "Every member completed a chore this week",
            Criterion::FullHouse,
        ),
        AchievementRule::new(
            "clean_sweep",
            "Clean Sweep",
            "Every chore on the list is done",
            Criterion::CleanSweep,
        ),
        AchievementRule::new(
            "every_weekday",
            "Seven Days a Week",
            "Complete chores on every day of the week",
            Criterion::EveryWeekday,
        ),
    ]
}

/// Every rule of the built-in catalog, families first.
pub fn standard_rules() -> Vec<AchievementRule> {
    let mut rules: Vec<AchievementRule> = standard_families().iter().flat_map(TierFamily::build).collect();
    rules.extend(ChoreCategory::ALL.into_iter().flat_map(|c| category_family(c).build()));
    rules.extend(standalone_rules());
    rules
}
