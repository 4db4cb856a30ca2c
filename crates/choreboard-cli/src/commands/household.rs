//! Household and member commands.

use clap::Subcommand;

use super::{open_db, print_json, CliResult};

#[derive(Subcommand)]
pub enum HouseholdAction {
    /// Create a household; its first period starts now
    Create {
        /// Household name
        name: String,
    },
    /// Add a member to a household
    AddMember {
        /// Household ID
        household_id: String,
        /// User ID
        user_id: String,
        /// Display name (defaults to the user ID)
        #[arg(long)]
        name: Option<String>,
    },
    /// List members of a household
    Members {
        /// Household ID
        household_id: String,
    },
    /// Show a household
    Get {
        /// Household ID
        household_id: String,
    },
}

pub fn run(action: HouseholdAction) -> CliResult {
    let db = open_db()?;
    match action {
        HouseholdAction::Create { name } => {
            let household = db.create_household(&name)?;
            print_json(&household)
        }
        HouseholdAction::AddMember {
            household_id,
            user_id,
            name,
        } => {
            let member = db.add_member(&household_id, &user_id, name.as_deref().unwrap_or(""))?;
            print_json(&member)
        }
        HouseholdAction::Members { household_id } => print_json(&db.list_members(&household_id)?),
        HouseholdAction::Get { household_id } => match db.get_household(&household_id)? {
            Some(household) => print_json(&household),
            None => Err(format!("household not found: {household_id}").into()),
        },
    }
}
