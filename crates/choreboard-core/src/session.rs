//! Async facade used by one client session.
//!
//! A [`HouseholdSession`] owns one connection to the shared store. Store
//! round-trips run on tokio's blocking pool and must be awaited; reward and
//! rule evaluation stay synchronous inside them.
//!
//! Completions and reversions that lose the write lock are retried from
//! scratch, up to `completion.max_attempts` times. Successful completions
//! schedule a debounced achievement evaluation for the completing member.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::achievements::{AchievementEngine, AchievementNotice, Debouncer, EvaluationKey};
use crate::error::{CompletionError, CoreError, DatabaseError, DeleteError, Result};
use crate::household::RotationOutcome;
use crate::reward::RewardPolicy;
use crate::storage::{CompletionReceipt, Config, DeleteSummary, HouseholdDb, Reversion};
use crate::task::TaskState;

#[derive(Clone)]
pub struct HouseholdSession {
    store: Arc<Mutex<HouseholdDb>>,
    config: Arc<Config>,
    engine: Arc<AchievementEngine>,
    policy: RewardPolicy,
    pending: Arc<Mutex<Debouncer<EvaluationKey>>>,
}

impl HouseholdSession {
    pub fn new(store: HouseholdDb, config: Config) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            policy: RewardPolicy::from_config(&config),
            pending: Arc::new(Mutex::new(Debouncer::from_config(&config))),
            engine: Arc::new(AchievementEngine::default()),
            config: Arc::new(config),
        }
    }

    /// Open a session on the store in the data directory.
    ///
    /// # Errors
    /// Returns an error if the store cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        let store = HouseholdDb::open(&config)?;
        Ok(Self::new(store, config))
    }

    /// Replace the built-in achievement catalog.
    pub fn with_engine(mut self, engine: AchievementEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &AchievementEngine {
        &self.engine
    }

    /// Run `f` against the store on the calling thread.
    ///
    /// # Errors
    /// Returns `SessionPoisoned` if an earlier operation panicked while
    /// holding the connection.
    pub fn with_store<T>(&self, f: impl FnOnce(&HouseholdDb) -> T) -> Result<T, DatabaseError> {
        let store = self.store.lock().map_err(|_| DatabaseError::SessionPoisoned)?;
        Ok(f(&store))
    }

    async fn blocking<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<DatabaseError> + Send + 'static,
        F: FnOnce(&HouseholdDb) -> Result<T, E> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let store = store.lock().map_err(|_| DatabaseError::SessionPoisoned)?;
            f(&store)
        })
        .await
        .map_err(|err| E::from(DatabaseError::QueryFailed(format!("store task aborted: {err}"))))?
    }

    async fn retry_conflicts<T, F>(&self, operation: &'static str, op: F) -> Result<T, CompletionError>
    where
        T: Send + 'static,
        F: Fn(&HouseholdDb) -> Result<T, CompletionError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let max_attempts = self.config.completion.max_attempts.max(1);
        let backoff = Duration::from_millis(self.config.completion.retry_backoff_ms);
        let mut attempt = 1;
        loop {
            let op = Arc::clone(&op);
            match self.blocking(move |store| op(store)).await {
                Err(CompletionError::TransactionConflict { .. }) if attempt < max_attempts => {
                    tracing::warn!(operation, attempt, "write lock contended, retrying");
                    tokio::time::sleep(backoff.saturating_mul(attempt)).await;
                    attempt += 1;
                }
                Err(CompletionError::TransactionConflict { .. }) => {
                    tracing::warn!(operation, attempts = max_attempts, "giving up after repeated conflicts");
                    return Err(CompletionError::TransactionConflict {
                        attempts: max_attempts,
                    });
                }
                other => return other,
            }
        }
    }

    /// Complete `task_id` as `user_id` now.
    ///
    /// `AlreadyCompleted` means another member won; it is never retried.
    pub async fn complete_task(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<CompletionReceipt, CompletionError> {
        self.complete_task_at(task_id, user_id, Utc::now()).await
    }

    pub async fn complete_task_at(
        &self,
        task_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<CompletionReceipt, CompletionError> {
        let (task, user, policy) = (task_id.to_string(), user_id.to_string(), self.policy.clone());
        let receipt = self
            .retry_conflicts("complete_task", move |store| {
                store.complete_task_at(&task, &user, &policy, at)
            })
            .await?;
        self.request_evaluation_at(&receipt.task.household_id, user_id, at);
        Ok(receipt)
    }

    pub async fn uncomplete_task(&self, task_id: &str) -> Result<Reversion, CompletionError> {
        let task = task_id.to_string();
        self.retry_conflicts("uncomplete_task", move |store| store.uncomplete_task(&task))
            .await
    }

    /// Re-read a task's state, e.g. after a completion timed out.
    pub async fn task_state(&self, task_id: &str) -> Result<TaskState> {
        let task = task_id.to_string();
        self.blocking(move |store| store.task_state(&task)).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<DeleteSummary, DeleteError> {
        let task = task_id.to_string();
        self.blocking(move |store| store.delete_task(&task)).await
    }

    pub async fn rotate_period(&self, household_id: &str) -> Result<RotationOutcome> {
        self.rotate_period_at(household_id, Utc::now()).await
    }

    pub async fn rotate_period_at(
        &self,
        household_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome> {
        let household = household_id.to_string();
        self.blocking(move |store| store.rotate_period_at(&household, now))
            .await
    }

    /// Evaluate and persist achievements for `user_id`; returns what this
    /// call unlocked.
    pub async fn evaluate_achievements(
        &self,
        household_id: &str,
        user_id: &str,
    ) -> Result<Vec<AchievementNotice>> {
        self.evaluate_achievements_at(household_id, user_id, Utc::now())
            .await
    }

    pub async fn evaluate_achievements_at(
        &self,
        household_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AchievementNotice>> {
        let (household, user) = (household_id.to_string(), user_id.to_string());
        let engine = Arc::clone(&self.engine);
        let offset = self.config.utc_offset();
        self.blocking(move |store| {
            store.evaluate_achievements_at(&household, &user, &engine, offset, now)
        })
        .await
    }

    /// Ask for an evaluation once the debounce window has been quiet.
    pub fn request_evaluation_at(&self, household_id: &str, user_id: &str, now: DateTime<Utc>) {
        let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.schedule((household_id.to_string(), user_id.to_string()), now);
    }

    /// Earliest time a requested evaluation becomes due.
    pub fn next_evaluation_due(&self) -> Option<DateTime<Utc>> {
        let pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.next_due()
    }

    /// Run every requested evaluation whose window has elapsed at `now`.
    pub async fn run_due_evaluations_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(EvaluationKey, Vec<AchievementNotice>)>> {
        let due = {
            let mut pending = self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            pending.drain_due(now)
        };
        let mut results = Vec::with_capacity(due.len());
        for (household_id, user_id) in due {
            let notices = match self.evaluate_achievements_at(&household_id, &user_id, now).await {
                Ok(notices) => notices,
                Err(CoreError::Validation(err)) => {
                    // Member or household removed since the request.
                    tracing::debug!(%household_id, %user_id, "skipping evaluation: {err}");
                    continue;
                }
                Err(err) => return Err(err),
            };
            results.push(((household_id, user_id), notices));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::{AchievementBook, Criterion, TierFamily};
    use crate::task::Assignee;
    use chrono::{Duration as ChronoDuration, TimeZone, Weekday};

    fn session() -> (HouseholdSession, String) {
        let session = HouseholdSession::new(HouseholdDb::open_memory().unwrap(), Config::default());
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        let household = session
            .with_store(|db| {
                let household = db.create_household_at("Home", start).unwrap();
                db.add_member(&household.id, "ana", "Ana").unwrap();
                db.add_member(&household.id, "ben", "Ben").unwrap();
                household
            })
            .unwrap();
        (session, household.id)
    }

    fn add_chore(session: &HouseholdSession, household_id: &str, name: &str) -> String {
        session
            .with_store(|db| {
                db.create_task(household_id, name, Weekday::Mon, 10, Assignee::Anyone)
                    .unwrap()
                    .id
            })
            .unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn complete_then_already_completed() {
        let (session, household) = session();
        let task = add_chore(&session, &household, "Wash dishes");
        let receipt = session.complete_task_at(&task, "ana", at(9)).await.unwrap();
        assert_eq!(receipt.reward.final_points, 20);
        let err = session.complete_task_at(&task, "ben", at(10)).await.unwrap_err();
        assert!(matches!(err, CompletionError::AlreadyCompleted { .. }));
        assert_eq!(session.task_state(&task).await.unwrap(), TaskState::Completed);
    }

    #[tokio::test]
    async fn completion_schedules_a_debounced_evaluation() {
        let (session, household) = session();
        let task = add_chore(&session, &household, "Wash dishes");
        session.complete_task_at(&task, "ana", at(9)).await.unwrap();
        assert_eq!(session.next_evaluation_due(), Some(at(9) + ChronoDuration::seconds(1)));

        assert!(session.run_due_evaluations_at(at(9)).await.unwrap().is_empty());
        let ran = session
            .run_due_evaluations_at(at(9) + ChronoDuration::seconds(2))
            .await
            .unwrap();
        assert_eq!(ran.len(), 1);
        assert_eq!(ran[0].0, (household.clone(), "ana".to_string()));
        assert!(ran[0].1.iter().any(|n| n.id == "period_chores_1"));
        assert!(session.next_evaluation_due().is_none());
    }

    #[tokio::test]
    async fn injected_engine_replaces_the_catalog() {
        let (session, household) = session();
        let rules = TierFamily::new(
            "chores",
            "Chores",
            |count| Criterion::PeriodCompletions { count },
            |count| format!("Complete {count} chores"),
        )
        .tiers(&[1, 2])
        .build();
        let session = session.with_engine(AchievementEngine::new(AchievementBook::new(rules).unwrap()));
        assert_eq!(session.engine().book().len(), 2);

        let task = add_chore(&session, &household, "Wash dishes");
        session.complete_task_at(&task, "ana", at(9)).await.unwrap();
        let notices = session.evaluate_achievements_at(&household, "ana", at(10)).await.unwrap();
        let ids: Vec<&str> = notices.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["chores_1"]);
    }

    #[tokio::test]
    async fn oversized_debounce_window_does_not_break_completion() {
        let mut config = Config::default();
        config.achievements.debounce_ms = u64::MAX;
        let session = HouseholdSession::new(HouseholdDb::open_memory().unwrap(), config);
        let task = session
            .with_store(|db| {
                let household = db.create_household_at("Home", at(0)).unwrap();
                db.add_member(&household.id, "ana", "Ana").unwrap();
                db.create_task(&household.id, "Wash dishes", Weekday::Mon, 10, Assignee::Anyone)
                    .unwrap()
                    .id
            })
            .unwrap();

        let receipt = session.complete_task_at(&task, "ana", at(9)).await.unwrap();
        assert!(receipt.task.completed);
        assert_eq!(session.next_evaluation_due(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(session.run_due_evaluations_at(at(23)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn evaluation_is_idempotent() {
        let (session, household) = session();
        let task = add_chore(&session, &household, "Wash dishes");
        session.complete_task_at(&task, "ana", at(9)).await.unwrap();
        let first = session.evaluate_achievements_at(&household, "ana", at(10)).await.unwrap();
        assert!(!first.is_empty());
        let second = session.evaluate_achievements_at(&household, "ana", at(11)).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn rotate_and_delete_through_the_session() {
        let (session, household) = session();
        let done = add_chore(&session, &household, "Wash dishes");
        let pending = add_chore(&session, &household, "Mop floor");
        session.complete_task_at(&done, "ana", at(9)).await.unwrap();

        let outcome = session.rotate_period_at(&household, at(20)).await.unwrap();
        assert_eq!(outcome.archive().map(|a| a.events.len()), Some(1));
        assert_eq!(
            session.rotate_period_at(&household, at(21)).await.unwrap(),
            RotationOutcome::NoOp
        );
        assert_eq!(session.delete_task(&pending).await.unwrap().removed_events, 0);
        assert_eq!(session.task_state(&done).await.unwrap(), TaskState::Pending);
    }

    #[tokio::test]
    async fn uncomplete_reverts_points() {
        let (session, household) = session();
        let task = add_chore(&session, &household, "Wash dishes");
        session.complete_task_at(&task, "ana", at(9)).await.unwrap();
        let reversion = session.uncomplete_task(&task).await.unwrap();
        assert_eq!(reversion.removed_entry.map(|e| e.points), Some(20));
        let board = session.with_store(|db| db.leaderboard(&household).unwrap()).unwrap();
        assert!(board.iter().all(|row| row.stats.total_points == 0));
    }
}
