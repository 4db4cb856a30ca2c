//! Household chores and their completion state.
//!
//! A task is either `Pending` or `Completed`. The only way into `Completed` is
//! the completion transaction in [`crate::storage::HouseholdDb`]; the way back
//! is either the explicit uncomplete workflow or a period rotation.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Largest point value a single chore may carry before bonuses.
pub const MAX_BASE_POINTS: u32 = 1_000;

/// Completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Completed,
}

/// Who is expected to do a chore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "user_id")]
pub enum Assignee {
    Anyone,
    Member(String),
}

impl Assignee {
    /// Parse the CLI / storage form: `None` or `"anyone"` means anyone.
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            None => Assignee::Anyone,
            Some(v) if v.eq_ignore_ascii_case("anyone") || v.is_empty() => Assignee::Anyone,
            Some(v) => Assignee::Member(v.to_string()),
        }
    }

    /// Storage form; `None` for anyone.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Assignee::Anyone => None,
            Assignee::Member(id) => Some(id),
        }
    }
}

/// A chore on the shared household list.
///
/// `completer` is set exactly when `completed` is true; the storage layer
/// enforces the same invariant with a CHECK constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub household_id: String,
    pub name: String,
    /// Scheduled day of the week.
    pub day: Weekday,
    /// Base points before bonuses.
    pub points: u32,
    pub completed: bool,
    pub assignee: Assignee,
    pub completer: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with a fresh id.
    pub fn new(
        household_id: impl Into<String>,
        name: impl Into<String>,
        day: Weekday,
        points: u32,
        assignee: Assignee,
    ) -> Result<Self, ValidationError> {
        let name = validate_name(name.into())?;
        validate_points(points)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            household_id: household_id.into(),
            name,
            day,
            points,
            completed: false,
            assignee,
            completer: None,
            created_at: Utc::now(),
        })
    }

    pub fn state(&self) -> TaskState {
        if self.completed {
            TaskState::Completed
        } else {
            TaskState::Pending
        }
    }

    /// True when the chore is assigned to a specific member other than `user_id`.
    pub fn is_assigned_to_other(&self, user_id: &str) -> bool {
        matches!(&self.assignee, Assignee::Member(id) if id != user_id)
    }
}

/// Partial update applied by the UI layer. Never touches completion state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub day: Option<Weekday>,
    pub points: Option<u32>,
    pub assignee: Option<Assignee>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.day.is_none() && self.points.is_none() && self.assignee.is_none()
    }

    /// Apply to `task`, validating every provided field first.
    pub fn apply(self, task: &mut Task) -> Result<(), ValidationError> {
        let name = self.name.map(validate_name).transpose()?;
        if let Some(points) = self.points {
            validate_points(points)?;
        }

        if let Some(name) = name {
            task.name = name;
        }
        if let Some(day) = self.day {
            task.day = day;
        }
        if let Some(points) = self.points {
            task.points = points;
        }
        if let Some(assignee) = self.assignee {
            task.assignee = assignee;
        }
        Ok(())
    }
}

fn validate_name(name: String) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "task name must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_points(points: u32) -> Result<(), ValidationError> {
    if points > MAX_BASE_POINTS {
        return Err(ValidationError::InvalidValue {
            field: "points".into(),
            message: format!("must be at most {MAX_BASE_POINTS}, got {points}"),
        });
    }
    Ok(())
}

/// Parse a weekday from user input ("mon", "Monday", "0" = Monday).
pub fn parse_weekday(value: &str) -> Result<Weekday, ValidationError> {
    if let Ok(n) = value.parse::<u8>() {
        if let Ok(day) = Weekday::try_from(n) {
            return Ok(day);
        }
    }
    value.parse::<Weekday>().map_err(|_| ValidationError::InvalidValue {
        field: "day".into(),
        message: format!("'{value}' is not a day of the week"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task() -> Task {
        Task::new("house", "Wash dishes", Weekday::Mon, 10, Assignee::Anyone).unwrap()
    }

    #[test]
    fn new_task_is_pending_without_completer() {
        let task = make_task();
        assert_eq!(task.state(), TaskState::Pending);
        assert!(task.completer.is_none());
    }

    #[test]
    fn new_task_rejects_blank_name_and_excess_points() {
        assert!(Task::new("h", "   ", Weekday::Mon, 5, Assignee::Anyone).is_err());
        assert!(Task::new("h", "Mop", Weekday::Mon, MAX_BASE_POINTS + 1, Assignee::Anyone).is_err());
    }

    #[test]
    fn update_leaves_completion_alone() {
        let mut task = make_task();
        task.completed = true;
        task.completer = Some("ana".into());

        TaskUpdate {
            name: Some("Scrub pans".into()),
            points: Some(15),
            assignee: Some(Assignee::Member("ben".into())),
            ..Default::default()
        }
        .apply(&mut task)
        .unwrap();

        assert_eq!(task.name, "Scrub pans");
        assert_eq!(task.points, 15);
        assert!(task.completed);
        assert_eq!(task.completer.as_deref(), Some("ana"));
    }

    #[test]
    fn invalid_update_changes_nothing() {
        let mut task = make_task();
        let result = TaskUpdate {
            name: Some("Scrub pans".into()),
            points: Some(MAX_BASE_POINTS + 5),
            ..Default::default()
        }
        .apply(&mut task);
        assert!(result.is_err());
        assert_eq!(task.name, "Wash dishes");
    }

    #[test]
    fn assigned_to_other() {
        let mut task = make_task();
        assert!(!task.is_assigned_to_other("ana"));
        task.assignee = Assignee::Member("ben".into());
        assert!(task.is_assigned_to_other("ana"));
        assert!(!task.is_assigned_to_other("ben"));
    }

    #[test]
    fn parse_weekday_accepts_names_and_numbers() {
        assert_eq!(parse_weekday("mon").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("Friday").unwrap(), Weekday::Fri);
        assert_eq!(parse_weekday("6").unwrap(), Weekday::Sun);
        assert!(parse_weekday("someday").is_err());
    }

    #[test]
    fn assignee_from_option() {
        assert_eq!(Assignee::from_option(None), Assignee::Anyone);
        assert_eq!(Assignee::from_option(Some("Anyone")), Assignee::Anyone);
        assert_eq!(
            Assignee::from_option(Some("ana")),
            Assignee::Member("ana".into())
        );
    }
}
