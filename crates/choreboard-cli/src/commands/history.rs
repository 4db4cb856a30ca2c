//! History and leaderboard queries.

use chrono::{DateTime, Utc};
use clap::Args;

use super::{open_db, print_json, CliResult};

#[derive(Args)]
pub struct HistoryArgs {
    /// Household ID
    pub household_id: String,
    /// Only entries at or after this RFC 3339 timestamp
    #[arg(long, conflicts_with = "period")]
    pub since: Option<DateTime<Utc>>,
    /// Only entries of the current period
    #[arg(long)]
    pub period: bool,
}

pub fn run(args: HistoryArgs) -> CliResult {
    let db = open_db()?;
    let entries = if args.period {
        db.period_history(&args.household_id)?
    } else {
        db.history(&args.household_id, args.since)?
    };
    print_json(&entries)
}

pub fn leaderboard(household_id: &str) -> CliResult {
    let db = open_db()?;
    print_json(&db.leaderboard(household_id)?)
}
