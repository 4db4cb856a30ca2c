//! SQLite store for households, chores, completion history and achievements.
//!
//! Every session opens its own connection to the shared database file; the
//! SQLite write lock is the point where concurrent sessions are serialized.
//! Mutations that touch more than one row run inside `BEGIN IMMEDIATE`, so
//! the read-decide-write of a completion, a cascade delete or a rotation
//! holds the write lock from its first read to its commit.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::achievements::{AchievementEngine, AchievementNotice, RuleContext};
use crate::calendar::{from_storage, storage_precision, to_storage};
use crate::error::{CompletionError, CoreError, DatabaseError, DeleteError, Result, ValidationError};
use crate::history::{sort_chronologically, within, HistoryEntry, NewHistoryEntry};
use crate::household::{ArchivedPeriod, Household, Member, RotationOutcome};
use crate::reward::{compute_reward, Reward, RewardPolicy};
use crate::stats::{aggregate_by_user, aggregate_for, leaderboard, LeaderboardRow};
use crate::task::{Assignee, Task, TaskState, TaskUpdate};

use super::config::Config;
use super::data_dir;
use super::migrations;

const DB_FILE: &str = "choreboard.db";

const TASK_COLUMNS: &str =
    "id, household_id, name, day_of_week, points, completed, assignee, completer, created_at";
const HISTORY_COLUMNS: &str =
    "id, household_id, task_id, task_name, user_id, user_name, completed_at, points";

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Connection settings taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub busy_timeout: Duration,
    /// Remove archived events from the live history during rotation.
    pub purge_archived_events: bool,
}

impl StoreOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            busy_timeout: config.busy_timeout(),
            purge_archived_events: config.rotation.purge_archived_events,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of a successful completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReceipt {
    /// The task as committed.
    pub task: Task,
    pub entry: HistoryEntry,
    pub reward: Reward,
}

/// Result of `uncomplete_task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reversion {
    pub task: Task,
    /// The completion that was removed, if the current period still held one.
    pub removed_entry: Option<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSummary {
    pub task: Task,
    pub removed_events: usize,
}

/// One row of a household's unlocked set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRecord {
    pub achievement_id: String,
    pub unlocked_by: String,
    pub unlocked_at: DateTime<Utc>,
}

/// SQLite database for one client session.
pub struct HouseholdDb {
    conn: Connection,
    options: StoreOptions,
}

impl HouseholdDb {
    /// Open the shared database at `<data dir>/choreboard.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open(config: &Config) -> Result<Self> {
        let path = data_dir()?.join(DB_FILE);
        Ok(Self::open_at(&path, StoreOptions::from_config(config))?)
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path, options: StoreOptions) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(options.busy_timeout)?;
        // WAL lets readers proceed while another session holds the write lock.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened household store");
        Self::finish_open(conn, options)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::finish_open(conn, StoreOptions::default())
    }

    fn finish_open(conn: Connection, options: StoreOptions) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn, options })
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Run `body` inside `BEGIN IMMEDIATE`, committing on `Ok` and rolling
    /// back on `Err`.
    fn immediate<T, E>(&self, body: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match body(&self.conn) {
            Ok(value) => match self.conn.execute_batch("COMMIT;") {
                Ok(()) => Ok(value),
                Err(err) => {
                    let _ = self.conn.execute_batch("ROLLBACK;");
                    Err(err.into())
                }
            },
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    // === Households and members ===

    pub fn create_household(&self, name: &str) -> Result<Household> {
        self.create_household_at(name, Utc::now())
    }

    /// Create a household whose first period starts at `now`.
    pub fn create_household_at(&self, name: &str, now: DateTime<Utc>) -> Result<Household> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "household name cannot be empty".into(),
            }
            .into());
        }
        let now = storage_precision(now);
        let household = Household {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            period_start: now,
            created_at: now,
        };
        self.conn.execute(
            "INSERT INTO households (id, name, period_start, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                household.id,
                household.name,
                to_storage(household.period_start),
                to_storage(household.created_at)
            ],
        )?;
        tracing::info!(household_id = %household.id, "household created");
        Ok(household)
    }

    pub fn get_household(&self, household_id: &str) -> Result<Option<Household>> {
        Ok(load_household(&self.conn, household_id)?)
    }

    fn require_household(&self, household_id: &str) -> Result<Household> {
        load_household(&self.conn, household_id)?
            .ok_or_else(|| ValidationError::UnknownHousehold(household_id.to_string()).into())
    }

    pub fn add_member(&self, household_id: &str, user_id: &str, display_name: &str) -> Result<Member> {
        self.require_household(household_id)?;
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "user_id".into(),
                message: "user id cannot be empty".into(),
            }
            .into());
        }
        let display_name = match display_name.trim() {
            "" => user_id,
            name => name,
        };
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO members (household_id, user_id, display_name) VALUES (?1, ?2, ?3)",
            params![household_id, user_id, display_name],
        )?;
        if inserted == 0 {
            return Err(ValidationError::Duplicate {
                kind: "member",
                id: user_id.to_string(),
            }
            .into());
        }
        Ok(Member {
            household_id: household_id.to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
        })
    }

    pub fn list_members(&self, household_id: &str) -> Result<Vec<Member>> {
        self.require_household(household_id)?;
        Ok(load_members(&self.conn, household_id)?)
    }

    // === Tasks ===

    /// Insert a new pending task.
    ///
    /// # Errors
    /// Returns a validation error for an unknown household, a bad name or
    /// point value, or an assignee who is not a member.
    pub fn create_task(
        &self,
        household_id: &str,
        name: &str,
        day: Weekday,
        points: u32,
        assignee: Assignee,
    ) -> Result<Task> {
        self.require_household(household_id)?;
        self.require_assignee(household_id, &assignee)?;
        let mut task = Task::new(household_id, name, day, points, assignee)?;
        task.created_at = storage_precision(task.created_at);
        self.conn.execute(
            "INSERT INTO tasks (id, household_id, name, day_of_week, points, completed, assignee, completer, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, NULL, ?7)",
            params![
                task.id,
                task.household_id,
                task.name,
                task.day.num_days_from_monday(),
                task.points,
                task.assignee.user_id(),
                to_storage(task.created_at)
            ],
        )?;
        Ok(task)
    }

    fn require_assignee(&self, household_id: &str, assignee: &Assignee) -> Result<()> {
        if let Some(user_id) = assignee.user_id() {
            if load_member(&self.conn, household_id, user_id)?.is_none() {
                return Err(ValidationError::NotAMember {
                    household_id: household_id.to_string(),
                    user_id: user_id.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(load_task(&self.conn, task_id)?)
    }

    pub fn list_tasks(&self, household_id: &str) -> Result<Vec<Task>> {
        self.require_household(household_id)?;
        Ok(load_tasks(&self.conn, household_id)?)
    }

    /// Change name, day, points or assignee. Completion state is untouched.
    pub fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task> {
        let mut task = load_task(&self.conn, task_id)?
            .ok_or_else(|| ValidationError::UnknownTask(task_id.to_string()))?;
        if update.is_empty() {
            return Ok(task);
        }
        if let Some(assignee) = &update.assignee {
            self.require_assignee(&task.household_id, assignee)?;
        }
        update.apply(&mut task)?;
        self.conn.execute(
            "UPDATE tasks SET name = ?2, day_of_week = ?3, points = ?4, assignee = ?5 WHERE id = ?1",
            params![
                task.id,
                task.name,
                task.day.num_days_from_monday(),
                task.points,
                task.assignee.user_id()
            ],
        )?;
        Ok(task)
    }

    /// Current state, for callers re-reading after a timed-out completion.
    pub fn task_state(&self, task_id: &str) -> Result<TaskState> {
        load_task(&self.conn, task_id)?
            .map(|task| task.state())
            .ok_or_else(|| ValidationError::UnknownTask(task_id.to_string()).into())
    }

    // === History ===

    /// Append one entry outside of a completion. Used for imports and tests.
    pub fn append_history(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        Ok(insert_history(&self.conn, entry)?)
    }

    /// Entries of a household, oldest first, optionally from `since` on.
    pub fn history(&self, household_id: &str, since: Option<DateTime<Utc>>) -> Result<Vec<HistoryEntry>> {
        Ok(query_history(&self.conn, household_id, since, None)?)
    }

    /// Entries of the household's current period.
    pub fn period_history(&self, household_id: &str) -> Result<Vec<HistoryEntry>> {
        let household = self.require_household(household_id)?;
        self.history(household_id, Some(household.period_start))
    }

    /// Current-period totals for every member.
    pub fn leaderboard(&self, household_id: &str) -> Result<Vec<LeaderboardRow>> {
        let events = self.period_history(household_id)?;
        let members = load_members(&self.conn, household_id)?;
        Ok(leaderboard(&events, &members))
    }

    // === Completion ===

    pub fn complete_task(
        &self,
        task_id: &str,
        user_id: &str,
        policy: &RewardPolicy,
    ) -> Result<CompletionReceipt, CompletionError> {
        self.complete_task_at(task_id, user_id, policy, Utc::now())
    }

    /// Mark a pending task completed by `user_id` and append its history entry.
    ///
    /// The task is re-read after taking the write lock and flipped with a
    /// conditional update, so exactly one of several racing sessions wins.
    /// Lock contention is reported as `TransactionConflict`; callers retry the
    /// whole call.
    pub fn complete_task_at(
        &self,
        task_id: &str,
        user_id: &str,
        policy: &RewardPolicy,
        at: DateTime<Utc>,
    ) -> Result<CompletionReceipt, CompletionError> {
        let at = storage_precision(at);
        let receipt = self
            .immediate(|conn| -> Result<CompletionReceipt, CompletionError> {
                let mut task = load_task(conn, task_id)?
                    .ok_or_else(|| CompletionError::TaskNotFound(task_id.to_string()))?;
                if task.completed {
                    return Err(CompletionError::AlreadyCompleted {
                        task_id: task_id.to_string(),
                    });
                }
                let member = load_member(conn, &task.household_id, user_id)?.ok_or_else(|| {
                    CompletionError::NotAMember {
                        household_id: task.household_id.clone(),
                        user_id: user_id.to_string(),
                    }
                })?;

                let events = query_history(conn, &task.household_id, None, None)?;
                let tasks = load_tasks(conn, &task.household_id)?;
                let reward = compute_reward(policy, &task, &events, &tasks, user_id, at);
                let bonuses: Vec<&str> = reward.applied_bonuses.iter().map(|b| b.bonus.label()).collect();
                tracing::debug!(
                    task_id,
                    base = reward.base_points,
                    final_points = reward.final_points,
                    ?bonuses,
                    "reward computed"
                );

                let flipped = conn.execute(
                    "UPDATE tasks SET completed = 1, completer = ?2 WHERE id = ?1 AND completed = 0",
                    params![task_id, user_id],
                )?;
                if flipped != 1 {
                    return Err(CompletionError::AlreadyCompleted {
                        task_id: task_id.to_string(),
                    });
                }

                let entry = insert_history(
                    conn,
                    NewHistoryEntry {
                        household_id: task.household_id.clone(),
                        task_id: task.id.clone(),
                        task_name: task.name.clone(),
                        user_id: member.user_id.clone(),
                        user_name: member.display_name,
                        completed_at: at,
                        points: reward.final_points,
                    },
                )?;
                task.completed = true;
                task.completer = Some(member.user_id);
                Ok(CompletionReceipt { task, entry, reward })
            })
            .map_err(CompletionError::classify)?;

        tracing::info!(
            task_id,
            user_id,
            points = receipt.reward.final_points,
            "task completed"
        );
        Ok(receipt)
    }

    /// Revert a completion: the task goes back to pending and the entry that
    /// recorded it in the current period is removed. Unlocks are kept.
    pub fn uncomplete_task(&self, task_id: &str) -> Result<Reversion, CompletionError> {
        let reversion = self
            .immediate(|conn| -> Result<Reversion, CompletionError> {
                let mut task = load_task(conn, task_id)?
                    .ok_or_else(|| CompletionError::TaskNotFound(task_id.to_string()))?;
                if !task.completed {
                    return Err(CompletionError::NotCompleted {
                        task_id: task_id.to_string(),
                    });
                }
                let household = load_household(conn, &task.household_id)?
                    .ok_or_else(|| CompletionError::TaskNotFound(task_id.to_string()))?;

                let latest = conn
                    .query_row(
                        &format!(
                            "SELECT {HISTORY_COLUMNS} FROM history
                             WHERE task_id = ?1 AND completed_at >= ?2
                             ORDER BY completed_at DESC, id DESC LIMIT 1"
                        ),
                        params![task_id, to_storage(household.period_start)],
                        row_to_history,
                    )
                    .optional()?;
                if let Some(entry) = &latest {
                    conn.execute("DELETE FROM history WHERE id = ?1", params![entry.id])?;
                }
                conn.execute(
                    "UPDATE tasks SET completed = 0, completer = NULL WHERE id = ?1 AND completed = 1",
                    params![task_id],
                )?;
                task.completed = false;
                task.completer = None;
                Ok(Reversion {
                    task,
                    removed_entry: latest,
                })
            })
            .map_err(CompletionError::classify)?;

        tracing::info!(
            task_id,
            reverted_points = reversion.removed_entry.as_ref().map(|e| e.points),
            "task completion reverted"
        );
        Ok(reversion)
    }

    // === Deletion ===

    /// Delete a task. If it is completed, every history entry referencing it
    /// is removed in the same transaction.
    pub fn delete_task(&self, task_id: &str) -> Result<DeleteSummary, DeleteError> {
        let summary = self.immediate(|conn| -> Result<DeleteSummary, DeleteError> {
            let task = load_task(conn, task_id)?
                .ok_or_else(|| DeleteError::TaskNotFound(task_id.to_string()))?;
            let removed_events = if task.completed {
                conn.execute("DELETE FROM history WHERE task_id = ?1", params![task_id])
                    .map_err(|e| DeleteError::CascadeDeleteFailure {
                        task_id: task_id.to_string(),
                        source: e.into(),
                    })?
            } else {
                0
            };
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(DeleteSummary {
                task,
                removed_events,
            })
        })?;

        tracing::info!(task_id, removed_events = summary.removed_events, "task deleted");
        Ok(summary)
    }

    // === Rotation ===

    pub fn rotate_period(&self, household_id: &str) -> Result<RotationOutcome> {
        self.rotate_period_at(household_id, Utc::now())
    }

    /// Close the current period at `now`.
    ///
    /// The archive insert, the task reset, the optional purge and the period
    /// advance commit together. With no completions in `[period_start, now)`
    /// only the archive (and purge) is skipped: tasks are still reset, the
    /// period still advances and `NoOp` is returned. The period is advanced
    /// with a compare-and-set on the old start, so a rotation that already
    /// happened cannot be applied twice, and it never moves backwards.
    pub fn rotate_period_at(&self, household_id: &str, now: DateTime<Utc>) -> Result<RotationOutcome> {
        let now = storage_precision(now);
        let purge = self.options.purge_archived_events;
        let outcome = self.immediate(|conn| -> Result<RotationOutcome> {
            let household = load_household(conn, household_id)?
                .ok_or_else(|| ValidationError::UnknownHousehold(household_id.to_string()))?;
            let events = query_history(conn, household_id, Some(household.period_start), Some(now))?;

            let archived = if events.is_empty() {
                None
            } else {
                let stats = aggregate_by_user(&events);
                conn.execute(
                    "INSERT INTO archived_periods (household_id, period_start, period_end, events, stats)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        household_id,
                        to_storage(household.period_start),
                        to_storage(now),
                        serde_json::to_string(&events)?,
                        serde_json::to_string(&stats)?
                    ],
                )?;
                let archive_id = conn.last_insert_rowid();
                if purge {
                    conn.execute(
                        "DELETE FROM history WHERE household_id = ?1 AND completed_at >= ?2 AND completed_at < ?3",
                        params![household_id, to_storage(household.period_start), to_storage(now)],
                    )?;
                }
                Some(ArchivedPeriod {
                    id: archive_id,
                    household_id: household_id.to_string(),
                    period_start: household.period_start,
                    period_end: now,
                    events,
                    stats,
                })
            };

            let reset = conn.execute(
                "UPDATE tasks SET completed = 0, completer = NULL WHERE household_id = ?1 AND completed = 1",
                params![household_id],
            )?;
            let next_start = now.max(household.period_start);
            let advanced = conn.execute(
                "UPDATE households SET period_start = ?3 WHERE id = ?1 AND period_start = ?2",
                params![household_id, to_storage(household.period_start), to_storage(next_start)],
            )?;
            if advanced != 1 {
                return Err(CoreError::Custom(format!(
                    "period of household {household_id} moved during rotation"
                )));
            }
            tracing::debug!(household_id, reset_tasks = reset, "period advanced");

            Ok(archived.map_or(RotationOutcome::NoOp, RotationOutcome::Archived))
        })?;

        match &outcome {
            RotationOutcome::Archived(archive) => tracing::info!(
                household_id,
                archive_id = archive.id,
                events = archive.events.len(),
                "period rotated"
            ),
            RotationOutcome::NoOp => tracing::info!(household_id, "nothing to archive, period advanced"),
        }
        Ok(outcome)
    }

    /// Archived periods, newest first.
    pub fn archives(&self, household_id: &str) -> Result<Vec<ArchivedPeriod>> {
        self.require_household(household_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, household_id, period_start, period_end, events, stats
             FROM archived_periods WHERE household_id = ?1
             ORDER BY period_end DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![household_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                time_column(row, 2)?,
                time_column(row, 3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut archives = Vec::new();
        for row in rows {
            let (id, household_id, period_start, period_end, events, stats) = row?;
            let corrupt = |e: serde_json::Error| DatabaseError::CorruptRow {
                table: "archived_periods",
                message: format!("archive {id}: {e}"),
            };
            let mut events: Vec<HistoryEntry> = serde_json::from_str(&events).map_err(corrupt)?;
            sort_chronologically(&mut events);
            archives.push(ArchivedPeriod {
                id,
                household_id,
                period_start,
                period_end,
                events,
                stats: serde_json::from_str(&stats).map_err(corrupt)?,
            });
        }
        Ok(archives)
    }

    // === Achievements ===

    pub fn unlocked_ids(&self, household_id: &str) -> Result<BTreeSet<String>> {
        Ok(load_unlocked(&self.conn, household_id)?
            .into_iter()
            .map(|record| record.achievement_id)
            .collect())
    }

    /// Unlock records, oldest first.
    pub fn unlocked(&self, household_id: &str) -> Result<Vec<UnlockRecord>> {
        self.require_household(household_id)?;
        Ok(load_unlocked(&self.conn, household_id)?)
    }

    /// Union `ids` into the household's unlocked set.
    ///
    /// Returns the ids that were not present before; ids already unlocked,
    /// by anyone, are left as they are.
    pub fn record_unlocks<'a>(
        &self,
        household_id: &str,
        user_id: &str,
        ids: impl IntoIterator<Item = &'a str>,
        at: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let at = to_storage(storage_precision(at));
        self.immediate(|conn| -> Result<Vec<String>> {
            let mut stmt = conn.prepare(
                "INSERT OR IGNORE INTO unlocked_achievements (household_id, achievement_id, unlocked_by, unlocked_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut inserted = Vec::new();
            for id in ids {
                if stmt.execute(params![household_id, id, user_id, at])? == 1 {
                    inserted.push(id.to_string());
                }
            }
            Ok(inserted)
        })
    }

    pub fn evaluate_achievements(
        &self,
        household_id: &str,
        user_id: &str,
        engine: &AchievementEngine,
        utc_offset: chrono::FixedOffset,
    ) -> Result<Vec<AchievementNotice>> {
        self.evaluate_achievements_at(household_id, user_id, engine, utc_offset, Utc::now())
    }

    /// Run the rule engine for `user_id` and persist what it unlocks.
    ///
    /// Only achievements this call actually added are returned, so two
    /// sessions evaluating at once never both announce the same unlock.
    pub fn evaluate_achievements_at(
        &self,
        household_id: &str,
        user_id: &str,
        engine: &AchievementEngine,
        utc_offset: chrono::FixedOffset,
        now: DateTime<Utc>,
    ) -> Result<Vec<AchievementNotice>> {
        let household = self.require_household(household_id)?;
        if load_member(&self.conn, household_id, user_id)?.is_none() {
            return Err(ValidationError::NotAMember {
                household_id: household_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        let (events, tasks, members, already) = {
            let tx = self.conn.unchecked_transaction()?;
            let snapshot = (
                query_history(&tx, household_id, None, None)?,
                load_tasks(&tx, household_id)?,
                load_members(&tx, household_id)?,
                self.unlocked_ids(household_id)?,
            );
            tx.commit()?;
            snapshot
        };

        let stats = aggregate_for(within(&events, household.period_start, None), user_id);
        let ctx = RuleContext {
            stats: &stats,
            events: &events,
            tasks: &tasks,
            members: &members,
            user_id,
            period_start: household.period_start,
            utc_offset,
        };
        let candidates = engine.evaluate(&ctx, &already);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let inserted: BTreeSet<String> = self
            .record_unlocks(household_id, user_id, candidates.iter().map(|n| n.id.as_str()), now)?
            .into_iter()
            .collect();
        let notices: Vec<AchievementNotice> = candidates
            .into_iter()
            .filter(|n| inserted.contains(&n.id))
            .collect();
        if !notices.is_empty() {
            tracing::info!(household_id, user_id, unlocked = notices.len(), "achievements unlocked");
        }
        Ok(notices)
    }
}

// === Row helpers ===

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    from_storage(&raw).ok_or_else(|| conversion_error(idx, format!("invalid timestamp '{raw}'")))
}

fn weekday_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Weekday> {
    let raw: i64 = row.get(idx)?;
    usize::try_from(raw)
        .ok()
        .and_then(|i| WEEKDAYS.get(i).copied())
        .ok_or_else(|| conversion_error(idx, format!("invalid day of week {raw}")))
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let assignee: Option<String> = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        household_id: row.get(1)?,
        name: row.get(2)?,
        day: weekday_column(row, 3)?,
        points: row.get(4)?,
        completed: row.get(5)?,
        assignee: Assignee::from_option(assignee.as_deref()),
        completer: row.get(7)?,
        created_at: time_column(row, 8)?,
    })
}

fn row_to_history(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        household_id: row.get(1)?,
        task_id: row.get(2)?,
        task_name: row.get(3)?,
        user_id: row.get(4)?,
        user_name: row.get(5)?,
        completed_at: time_column(row, 6)?,
        points: row.get(7)?,
    })
}

fn load_household(conn: &Connection, household_id: &str) -> rusqlite::Result<Option<Household>> {
    conn.query_row(
        "SELECT id, name, period_start, created_at FROM households WHERE id = ?1",
        params![household_id],
        |row| {
            Ok(Household {
                id: row.get(0)?,
                name: row.get(1)?,
                period_start: time_column(row, 2)?,
                created_at: time_column(row, 3)?,
            })
        },
    )
    .optional()
}

fn load_member(conn: &Connection, household_id: &str, user_id: &str) -> rusqlite::Result<Option<Member>> {
    conn.query_row(
        "SELECT household_id, user_id, display_name FROM members WHERE household_id = ?1 AND user_id = ?2",
        params![household_id, user_id],
        |row| {
            Ok(Member {
                household_id: row.get(0)?,
                user_id: row.get(1)?,
                display_name: row.get(2)?,
            })
        },
    )
    .optional()
}

fn load_members(conn: &Connection, household_id: &str) -> rusqlite::Result<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT household_id, user_id, display_name FROM members
         WHERE household_id = ?1 ORDER BY display_name, user_id",
    )?;
    let rows = stmt.query_map(params![household_id], |row| {
        Ok(Member {
            household_id: row.get(0)?,
            user_id: row.get(1)?,
            display_name: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn load_task(conn: &Connection, task_id: &str) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![task_id],
        row_to_task,
    )
    .optional()
}

fn load_tasks(conn: &Connection, household_id: &str) -> rusqlite::Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE household_id = ?1 ORDER BY day_of_week, created_at, id"
    ))?;
    let rows = stmt.query_map(params![household_id], row_to_task)?;
    rows.collect()
}

/// Entries in `[since, until)`, ordered by timestamp then insertion order.
fn query_history(
    conn: &Connection,
    household_id: &str,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> rusqlite::Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HISTORY_COLUMNS} FROM history
         WHERE household_id = ?1
           AND (?2 IS NULL OR completed_at >= ?2)
           AND (?3 IS NULL OR completed_at < ?3)
         ORDER BY completed_at, id"
    ))?;
    let rows = stmt.query_map(
        params![household_id, since.map(to_storage), until.map(to_storage)],
        row_to_history,
    )?;
    rows.collect()
}

fn insert_history(conn: &Connection, entry: NewHistoryEntry) -> rusqlite::Result<HistoryEntry> {
    let entry = NewHistoryEntry {
        completed_at: storage_precision(entry.completed_at),
        ..entry
    };
    conn.execute(
        "INSERT INTO history (household_id, task_id, task_name, user_id, user_name, completed_at, points)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.household_id,
            entry.task_id,
            entry.task_name,
            entry.user_id,
            entry.user_name,
            to_storage(entry.completed_at),
            entry.points
        ],
    )?;
    Ok(entry.into_entry(conn.last_insert_rowid()))
}

fn load_unlocked(conn: &Connection, household_id: &str) -> rusqlite::Result<Vec<UnlockRecord>> {
    let mut stmt = conn.prepare(
        "SELECT achievement_id, unlocked_by, unlocked_at FROM unlocked_achievements
         WHERE household_id = ?1 ORDER BY unlocked_at, achievement_id",
    )?;
    let rows = stmt.query_map(params![household_id], |row| {
        Ok(UnlockRecord {
            achievement_id: row.get(0)?,
            unlocked_by: row.get(1)?,
            unlocked_at: time_column(row, 2)?,
        })
    })?;
    rows.collect()
}
