//! Database schema migrations for choreboard.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(err) => Err(err),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: households, members, tasks and the completion history.
///
/// The CHECK on `tasks` keeps `completer` set exactly when `completed = 1`.
/// `history.task_id` deliberately has no foreign key: entries outlive tasks.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS households (
            id           TEXT PRIMARY KEY,
            name         TEXT NOT NULL,
            period_start TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS members (
            household_id TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
            user_id      TEXT NOT NULL,
            display_name TEXT NOT NULL,
            PRIMARY KEY (household_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id           TEXT PRIMARY KEY,
            household_id TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
            name         TEXT NOT NULL,
            day_of_week  INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
            points       INTEGER NOT NULL CHECK (points >= 0),
            completed    INTEGER NOT NULL DEFAULT 0,
            assignee     TEXT,
            completer    TEXT,
            created_at   TEXT NOT NULL,
            CHECK ((completed = 1) = (completer IS NOT NULL))
        );

        CREATE TABLE IF NOT EXISTS history (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            household_id TEXT NOT NULL,
            task_id      TEXT NOT NULL,
            task_name    TEXT NOT NULL,
            user_id      TEXT NOT NULL,
            user_name    TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            points       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_household ON tasks(household_id);
        CREATE INDEX IF NOT EXISTS idx_history_household_time ON history(household_id, completed_at, id);
        CREATE INDEX IF NOT EXISTS idx_history_task ON history(task_id);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: achievement unlocks and archived periods.
///
/// The unlock primary key makes re-granting an id a no-op.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS unlocked_achievements (
            household_id   TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
            achievement_id TEXT NOT NULL,
            unlocked_by    TEXT NOT NULL,
            unlocked_at    TEXT NOT NULL,
            PRIMARY KEY (household_id, achievement_id)
        );

        CREATE TABLE IF NOT EXISTS archived_periods (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            household_id TEXT NOT NULL REFERENCES households(id) ON DELETE CASCADE,
            period_start TEXT NOT NULL,
            period_end   TEXT NOT NULL,
            events       TEXT NOT NULL,
            stats        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_archived_household ON archived_periods(household_id, period_end);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn completer_invariant_is_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO households (id, name, period_start, created_at) VALUES ('h', 'Home', 'x', 'x')",
            [],
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO tasks (id, household_id, name, day_of_week, points, completed, completer, created_at)
             VALUES ('t', 'h', 'Dishes', 0, 5, 1, NULL, 'x')",
            [],
        );
        assert!(bad.is_err());
        let bad = conn.execute(
            "INSERT INTO tasks (id, household_id, name, day_of_week, points, completed, completer, created_at)
             VALUES ('t', 'h', 'Dishes', 0, 5, 0, 'ana', 'x')",
            [],
        );
        assert!(bad.is_err());
    }
}
