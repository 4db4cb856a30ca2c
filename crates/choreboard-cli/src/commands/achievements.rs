//! Achievement commands.

use clap::Subcommand;
use choreboard_core::AchievementBook;
use serde_json::json;

use super::{block_on, open_db, open_session, print_json, CliResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// Evaluate achievements for a member and record new unlocks
    Evaluate {
        /// Household ID
        household_id: String,
        /// Member ID
        #[arg(long)]
        user: String,
    },
    /// List the household's unlocked achievements
    Unlocked {
        /// Household ID
        household_id: String,
    },
    /// List every achievement in the catalog
    Catalog,
}

pub fn run(action: AchievementsAction) -> CliResult {
    match action {
        AchievementsAction::Evaluate { household_id, user } => {
            let session = open_session()?;
            let notices = block_on(session.evaluate_achievements(&household_id, &user))??;
            print_json(&notices)
        }
        AchievementsAction::Unlocked { household_id } => {
            let db = open_db()?;
            let book = AchievementBook::standard();
            let unlocked: Vec<_> = db
                .unlocked(&household_id)?
                .into_iter()
                .map(|record| {
                    let rule = book.get(&record.achievement_id);
                    json!({
                        "id": record.achievement_id,
                        "name": rule.map(|r| r.name.as_str()),
                        "description": rule.map(|r| r.description.as_str()),
                        "unlocked_by": record.unlocked_by,
                        "unlocked_at": record.unlocked_at,
                    })
                })
                .collect();
            print_json(&unlocked)
        }
        AchievementsAction::Catalog => {
            let book = AchievementBook::standard();
            let catalog: Vec<_> = book
                .rules()
                .iter()
                .map(|rule| {
                    json!({
                        "id": rule.id,
                        "name": rule.name,
                        "description": rule.description,
                        "tier": rule.tier,
                    })
                })
                .collect();
            print_json(&catalog)
        }
    }
}
