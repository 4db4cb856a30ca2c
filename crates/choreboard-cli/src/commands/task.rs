//! Chore commands, including the completion workflow.

use clap::Subcommand;
use choreboard_core::task::parse_weekday;
use choreboard_core::{Assignee, CompletionError, TaskUpdate};
use serde_json::json;

use super::{block_on, open_db, open_session, print_json, CliResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new chore
    Create {
        /// Household ID
        household_id: String,
        /// Chore name
        name: String,
        /// Scheduled day (mon..sun or 0..6 from Monday)
        #[arg(long, default_value = "mon")]
        day: String,
        /// Base points
        #[arg(long, default_value = "10")]
        points: u32,
        /// Assigned member ID ("anyone" for no assignee)
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Update a chore without touching its completion state
    Update {
        /// Task ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        day: Option<String>,
        #[arg(long)]
        points: Option<u32>,
        /// Member ID, or "anyone"
        #[arg(long)]
        assignee: Option<String>,
    },
    /// List chores of a household
    List {
        /// Household ID
        household_id: String,
        /// Only chores that are still pending
        #[arg(long)]
        pending: bool,
    },
    /// Get chore details
    Get {
        /// Task ID
        id: String,
    },
    /// Complete a chore
    Complete {
        /// Task ID
        id: String,
        /// Completing member
        #[arg(long)]
        user: String,
    },
    /// Revert a completion and its points
    Uncomplete {
        /// Task ID
        id: String,
    },
    /// Delete a chore; a completed chore takes its history with it
    Delete {
        /// Task ID
        id: String,
    },
    /// Show whether a chore is pending or completed
    State {
        /// Task ID
        id: String,
    },
}

pub fn run(action: TaskAction) -> CliResult {
    match action {
        TaskAction::Create {
            household_id,
            name,
            day,
            points,
            assignee,
        } => {
            let db = open_db()?;
            let task = db.create_task(
                &household_id,
                &name,
                parse_weekday(&day)?,
                points,
                Assignee::from_option(assignee.as_deref()),
            )?;
            print_json(&task)
        }
        TaskAction::Update {
            id,
            name,
            day,
            points,
            assignee,
        } => {
            let db = open_db()?;
            let update = TaskUpdate {
                name,
                day: day.as_deref().map(parse_weekday).transpose()?,
                points,
                assignee: assignee.map(|a| Assignee::from_option(Some(&a))),
            };
            print_json(&db.update_task(&id, update)?)
        }
        TaskAction::List {
            household_id,
            pending,
        } => {
            let db = open_db()?;
            let mut tasks = db.list_tasks(&household_id)?;
            if pending {
                tasks.retain(|t| !t.completed);
            }
            print_json(&tasks)
        }
        TaskAction::Get { id } => {
            let db = open_db()?;
            match db.get_task(&id)? {
                Some(task) => print_json(&task),
                None => Err(format!("task not found: {id}").into()),
            }
        }
        TaskAction::Complete { id, user } => {
            let session = open_session()?;
            match block_on(session.complete_task(&id, &user))? {
                Ok(receipt) => print_json(&receipt),
                Err(CompletionError::AlreadyCompleted { task_id }) => {
                    eprintln!("someone beat you to it: task {task_id} is already completed");
                    print_json(&json!({ "outcome": "already_completed", "task_id": task_id }))
                }
                Err(err) => Err(err.into()),
            }
        }
        TaskAction::Uncomplete { id } => {
            let session = open_session()?;
            let reversion = block_on(session.uncomplete_task(&id))??;
            print_json(&reversion)
        }
        TaskAction::Delete { id } => {
            let session = open_session()?;
            let summary = block_on(session.delete_task(&id))??;
            print_json(&summary)
        }
        TaskAction::State { id } => {
            let session = open_session()?;
            let state = block_on(session.task_state(&id))??;
            print_json(&json!({ "task_id": id, "state": state }))
        }
    }
}
