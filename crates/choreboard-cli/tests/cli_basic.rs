//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_choreboard"))
        .args(args)
        .env("CHOREBOARD_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn household_with_members(dir: &Path) -> String {
    let household = run_json(dir, &["household", "create", "Test Home"]);
    let id = household["id"].as_str().unwrap().to_string();
    run_json(dir, &["household", "add-member", &id, "ana", "--name", "Ana"]);
    run_json(dir, &["household", "add-member", &id, "ben", "--name", "Ben"]);
    id
}

#[test]
fn test_household_create_and_members() {
    let dir = TempDir::new().unwrap();
    let id = household_with_members(dir.path());
    let members = run_json(dir.path(), &["household", "members", &id]);
    assert_eq!(members.as_array().unwrap().len(), 2);
}

#[test]
fn test_task_complete_twice() {
    let dir = TempDir::new().unwrap();
    let household = household_with_members(dir.path());
    let task = run_json(
        dir.path(),
        &["task", "create", &household, "Wash dishes", "--day", "tue", "--points", "10"],
    );
    let task_id = task["id"].as_str().unwrap();

    let receipt = run_json(dir.path(), &["task", "complete", task_id, "--user", "ana"]);
    assert_eq!(receipt["task"]["completed"], Value::Bool(true));
    assert_eq!(receipt["reward"]["base_points"], 10);
    assert!(receipt["reward"]["final_points"].as_u64().unwrap() >= 10);

    let second = run_json(dir.path(), &["task", "complete", task_id, "--user", "ben"]);
    assert_eq!(second["outcome"], "already_completed");

    let state = run_json(dir.path(), &["task", "state", task_id]);
    assert_eq!(state["state"], "completed");

    let history = run_json(dir.path(), &["history", &household]);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[test]
fn test_rotate_then_noop() {
    let dir = TempDir::new().unwrap();
    let household = household_with_members(dir.path());
    let task = run_json(dir.path(), &["task", "create", &household, "Mop floor"]);
    let task_id = task["id"].as_str().unwrap();
    run_json(dir.path(), &["task", "complete", task_id, "--user", "ben"]);

    let rotated = run_json(dir.path(), &["rotate", &household]);
    assert_eq!(rotated["outcome"], "archived");
    let again = run_json(dir.path(), &["rotate", &household]);
    assert_eq!(again["outcome"], "no_op");

    let archives = run_json(dir.path(), &["archives", &household]);
    assert_eq!(archives.as_array().unwrap().len(), 1);
    let state = run_json(dir.path(), &["task", "state", task_id]);
    assert_eq!(state["state"], "pending");
}

#[test]
fn test_achievements_evaluate_and_catalog() {
    let dir = TempDir::new().unwrap();
    let household = household_with_members(dir.path());
    let task = run_json(dir.path(), &["task", "create", &household, "Fold laundry"]);
    run_json(dir.path(), &["task", "complete", task["id"].as_str().unwrap(), "--user", "ana"]);

    let unlocked = run_json(dir.path(), &["achievements", "evaluate", &household, "--user", "ana"]);
    assert!(unlocked
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["id"] == "laundry_1"));
    let again = run_json(dir.path(), &["achievements", "evaluate", &household, "--user", "ana"]);
    assert!(again.as_array().unwrap().is_empty());

    let catalog = run_json(dir.path(), &["achievements", "catalog"]);
    assert!(catalog.as_array().unwrap().len() >= 150);
}

#[test]
fn test_delete_completed_task_removes_history() {
    let dir = TempDir::new().unwrap();
    let household = household_with_members(dir.path());
    let task = run_json(dir.path(), &["task", "create", &household, "Take out trash"]);
    let task_id = task["id"].as_str().unwrap();
    run_json(dir.path(), &["task", "complete", task_id, "--user", "ana"]);

    let summary = run_json(dir.path(), &["task", "delete", task_id]);
    assert_eq!(summary["removed_events"], 1);
    let history = run_json(dir.path(), &["history", &household]);
    assert!(history.as_array().unwrap().is_empty());
}

#[test]
fn test_config_set_get_and_reset() {
    let dir = TempDir::new().unwrap();
    let changed = run_json(dir.path(), &["config", "set", "reward.momentum_multiplier", "1.75"]);
    assert_eq!(changed["key"], "reward.momentum_multiplier");
    assert_eq!(changed["previous"], "1.5");
    assert_eq!(changed["value"], "1.75");
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "reward.momentum_multiplier"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1.75");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "reward.momentum_multiplier", "0.5"]);
    assert_ne!(code, 0);
    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "reward.no_such_key"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let defaults = run_json(dir.path(), &["config", "reset"]);
    assert_eq!(defaults["reward"]["momentum_multiplier"], 1.5);
    let listed = run_json(dir.path(), &["config", "list"]);
    assert_eq!(listed, defaults);
}

#[test]
fn test_unknown_task_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["task", "complete", "missing", "--user", "ana"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}
