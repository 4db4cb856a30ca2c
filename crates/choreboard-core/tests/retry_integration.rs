//! Integration tests for completion retries while another connection holds
//! the write lock on the shared database file.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc, Weekday};
use choreboard_core::{
    Assignee, CompletionError, Config, HouseholdDb, HouseholdSession, StoreOptions, TaskState,
};
use rusqlite::Connection;
use tempfile::TempDir;

fn monday(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap()
}

fn impatient_config(max_attempts: u32, retry_backoff_ms: u64) -> Config {
    let mut config = Config::default();
    config.completion.busy_timeout_ms = 1;
    config.completion.max_attempts = max_attempts;
    config.completion.retry_backoff_ms = retry_backoff_ms;
    config
}

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
    session: HouseholdSession,
    household_id: String,
    task_id: String,
}

fn fixture(config: Config) -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("choreboard.db");
    let db = HouseholdDb::open_at(&path, StoreOptions::from_config(&config)).unwrap();
    let household = db.create_household_at("Elm Court", monday(0)).unwrap();
    db.add_member(&household.id, "ana", "Ana").unwrap();
    let task = db
        .create_task(&household.id, "Wash dishes", Weekday::Mon, 10, Assignee::Anyone)
        .unwrap();
    Fixture {
        _dir: dir,
        path,
        session: HouseholdSession::new(db, config),
        household_id: household.id,
        task_id: task.id,
    }
}

fn lock_writer(path: &Path) -> Connection {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;").unwrap();
    conn
}

#[tokio::test]
async fn completion_succeeds_once_the_lock_is_released() {
    let f = fixture(impatient_config(20, 10));
    let (ready_tx, ready_rx) = mpsc::channel();
    let path = f.path.clone();
    let task_id = f.task_id.clone();
    let holder = thread::spawn(move || {
        let conn = lock_writer(&path);
        // Changed while the session is locked out; a retry must read it fresh.
        conn.execute("UPDATE tasks SET points = 40 WHERE id = ?1", [&task_id])
            .unwrap();
        ready_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
        conn.execute_batch("COMMIT;").unwrap();
    });
    ready_rx.recv().unwrap();

    let receipt = f
        .session
        .complete_task_at(&f.task_id, "ana", monday(9))
        .await
        .unwrap();
    holder.join().unwrap();

    assert_eq!(receipt.reward.base_points, 40);
    assert_eq!(receipt.entry.points, receipt.reward.final_points);
    assert_eq!(f.session.task_state(&f.task_id).await.unwrap(), TaskState::Completed);
    let history = f
        .session
        .with_store(|db| db.history(&f.household_id, None).unwrap())
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn completion_gives_up_after_max_attempts() {
    let f = fixture(impatient_config(3, 1));
    let holder = lock_writer(&f.path);

    let err = f
        .session
        .complete_task_at(&f.task_id, "ana", monday(9))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CompletionError::TransactionConflict { attempts: 3 }),
        "unexpected error: {err}"
    );

    holder.execute_batch("ROLLBACK;").unwrap();
    assert_eq!(f.session.task_state(&f.task_id).await.unwrap(), TaskState::Pending);
    let (history, task) = f
        .session
        .with_store(|db| {
            (
                db.history(&f.household_id, None).unwrap(),
                db.get_task(&f.task_id).unwrap().unwrap(),
            )
        })
        .unwrap();
    assert!(history.is_empty());
    assert!(task.completer.is_none());
    assert!(f.session.next_evaluation_due().is_none());
}
