//! Core error types for choreboard-core.
//!
//! Expected race outcomes (`AlreadyCompleted`, `TransactionConflict`) and the
//! cascade failure of a task delete are distinct variants so callers can word
//! them for users; only infrastructure faults travel as [`DatabaseError`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for choreboard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Another connection holds the write lock past the busy timeout
    #[error("Database is busy")]
    Busy,

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A previous operation panicked while holding the session connection
    #[error("Session connection is poisoned")]
    SessionPoisoned,

    /// Stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

impl DatabaseError {
    /// Whether the failure is transient lock contention worth retrying.
    pub fn is_contention(&self) -> bool {
        matches!(self, DatabaseError::Busy | DatabaseError::Locked)
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// No household with this id
    #[error("Unknown household: {0}")]
    UnknownHousehold(String),

    /// No task with this id
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// User does not belong to the household
    #[error("User '{user_id}' is not a member of household {household_id}")]
    NotAMember {
        household_id: String,
        user_id: String,
    },

    /// Duplicate identifier
    #[error("Duplicate {kind} id: {id}")]
    Duplicate { kind: &'static str, id: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Outcome of a failed `complete_task` / `uncomplete_task`.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Someone else completed the task first. Not a fault.
    #[error("Task {task_id} was already completed")]
    AlreadyCompleted { task_id: String },

    /// Reverting a task that is not completed
    #[error("Task {task_id} is not completed")]
    NotCompleted { task_id: String },

    #[error("Unknown task: {0}")]
    TaskNotFound(String),

    #[error("User '{user_id}' is not a member of household {household_id}")]
    NotAMember {
        household_id: String,
        user_id: String,
    },

    /// The atomic step kept losing the write lock
    #[error("Transaction conflict after {attempts} attempt(s)")]
    TransactionConflict { attempts: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Outcome of a failed `delete_task`.
#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("Unknown task: {0}")]
    TaskNotFound(String),

    /// Removing the task's history failed; history may disagree with points.
    #[error("Failed to delete history of task {task_id}: {source}")]
    CascadeDeleteFailure {
        task_id: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => match code.code {
                rusqlite::ErrorCode::DatabaseBusy => DatabaseError::Busy,
                rusqlite::ErrorCode::DatabaseLocked => DatabaseError::Locked,
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<rusqlite::Error> for CompletionError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

impl From<rusqlite::Error> for DeleteError {
    fn from(err: rusqlite::Error) -> Self {
        DeleteError::Database(err.into())
    }
}

impl CompletionError {
    /// Collapse lock contention into `TransactionConflict`, leaving other
    /// variants untouched.
    pub(crate) fn classify(self) -> Self {
        match self {
            CompletionError::Database(db) if db.is_contention() => {
                CompletionError::TransactionConflict { attempts: 1 }
            }
            other => other,
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn busy_and_locked_are_contention() {
        let busy = DatabaseError::from(sqlite_failure(rusqlite::ffi::SQLITE_BUSY));
        let locked = DatabaseError::from(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED));
        assert!(matches!(busy, DatabaseError::Busy));
        assert!(matches!(locked, DatabaseError::Locked));
        assert!(busy.is_contention());
        assert!(locked.is_contention());
    }

    #[test]
    fn other_failures_are_query_errors() {
        let err = DatabaseError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, DatabaseError::QueryFailed(_)));
        assert!(!err.is_contention());
    }

    #[test]
    fn classify_turns_contention_into_conflict() {
        let err = CompletionError::Database(DatabaseError::Busy).classify();
        assert!(matches!(
            err,
            CompletionError::TransactionConflict { attempts: 1 }
        ));

        let err = CompletionError::AlreadyCompleted {
            task_id: "t".into(),
        }
        .classify();
        assert!(matches!(err, CompletionError::AlreadyCompleted { .. }));
    }
}
