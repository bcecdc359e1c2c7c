//! E2E CLI tests covering:
//! - `bl init` and user registration
//! - Project, item and sprint creation through the CLI
//! - The sprint lifecycle with frozen velocity and the report
//! - Both history ledgers and the merged user activity feed
//! - Text output and the `--db` override
//!
//! Each test runs `bl` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

const EMAIL: &str = "ada@example.com";

/// Build a Command targeting the `bl` binary, rooted in `dir`, with the
/// user's own config and environment kept out of the way.
fn bl_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bl"));
    cmd.current_dir(dir);
    cmd.env("BACKLOG_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join("xdg"));
    cmd.env("HOME", dir);
    cmd.env_remove("BACKLOG_DB");
    cmd.env_remove("FORMAT");
    cmd.env("BACKLOG_USER", EMAIL);
    cmd
}

/// Run a command with `--json`, assert success and parse stdout.
fn json(dir: &Path, args: &[&str]) -> Value {
    let output = bl_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

/// Initialize a backlog, register Ada and create project CORE.
fn setup() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    bl_cmd(dir.path()).arg("init").assert().success();
    json(
        dir.path(),
        &[
            "user",
            "register",
            "--google-id",
            "g-ada",
            "--email",
            EMAIL,
            "--name",
            "Ada",
        ],
    );
    json(
        dir.path(),
        &["project", "create", "--name", "Core", "--key", "core"],
    );
    dir
}

fn create_item(dir: &Path, title: &str, points: &str) -> String {
    id_of(&json(
        dir,
        &[
            "item", "create", "--project", "CORE", "--title", title, "--points", points,
        ],
    ))
}

fn create_sprint(dir: &Path, name: &str) -> String {
    id_of(&json(
        dir,
        &[
            "sprint",
            "create",
            "--project",
            "CORE",
            "--name",
            name,
            "--start",
            "2026-03-02",
            "--end",
            "2026-03-16",
        ],
    ))
}

fn actions(entries: &Value) -> Vec<String> {
    entries
        .as_array()
        .expect("array")
        .iter()
        .map(|e| e["action"].as_str().expect("action").to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_creates_skeleton_and_is_rerunnable() {
    let dir = TempDir::new().expect("tempdir");
    bl_cmd(dir.path()).arg("init").assert().success();
    assert!(dir.path().join(".backlog/config.toml").exists());
    assert!(dir.path().join(".backlog/backlog.db").exists());

    let report = json(dir.path(), &["init"]);
    assert_eq!(report["config_written"], false);
}

#[test]
fn project_key_is_stored_uppercase_and_resolvable() {
    let dir = setup();
    let project = json(dir.path(), &["project", "show", "core"]);
    assert_eq!(project["key"], "CORE");
    assert_eq!(project["name"], "Core");

    let by_id = json(dir.path(), &["project", "show", &id_of(&project)]);
    assert_eq!(by_id["key"], "CORE");
}

#[test]
fn sprint_lifecycle_freezes_velocity_and_reports() {
    let dir = setup();
    let d = dir.path();
    let done = create_item(d, "Login page", "3");
    let open = create_item(d, "Logout", "5");
    let sprint = create_sprint(d, "Sprint 1");

    let with_items = json(d, &["sprint", "add", &sprint, &done]);
    assert_eq!(with_items["total_items"], 1);
    let with_items = json(d, &["sprint", "add", &sprint, &open]);
    assert_eq!(with_items["total_items"], 2);
    assert_eq!(with_items["total_points"], 8);

    let item = json(d, &["item", "status", &done, "Done"]);
    assert_eq!(item["status"], "Done");

    let started = json(d, &["sprint", "start", &sprint]);
    assert_eq!(started["status"], "Active");
    let active = json(d, &["sprint", "active", "CORE"]);
    assert_eq!(id_of(&active), sprint);

    let completed = json(d, &["sprint", "complete", &sprint]);
    assert_eq!(completed["status"], "Completed");
    assert_eq!(completed["velocity"], 3);

    // Finishing more work afterwards does not move the frozen velocity.
    json(d, &["item", "status", &open, "Done"]);
    let report = json(d, &["sprint", "report", &sprint]);
    assert_eq!(report["total_items"], 2);
    assert_eq!(report["completed_items"], 2);
    assert_eq!(report["total_story_points"], 8);
    assert_eq!(report["velocity"], 3);
    assert_eq!(report["completion_percentage"], 100.0);

    let none = json(d, &["sprint", "active", "CORE"]);
    assert!(none.is_null());

    let history = json(d, &["sprint", "history", &sprint]);
    assert_eq!(
        actions(&history),
        ["Completed", "Started", "ItemAdded", "ItemAdded", "Created"]
    );
}

#[test]
fn item_ledger_and_activity_feed() {
    let dir = setup();
    let d = dir.path();
    let item = create_item(d, "Search", "2");
    let sprint = create_sprint(d, "Sprint 1");

    json(d, &["item", "update", &item, "--sprint", &sprint, "--priority", "High"]);
    json(d, &["item", "tag", &item, "ui", "search"]);
    let comment = json(d, &["item", "comment", &item, "needs design"]);
    assert_eq!(comment["action"], "CommentAdded");
    assert_eq!(comment["comment"], "needs design");

    let history = json(d, &["item", "history", &item]);
    let got = actions(&history);
    assert_eq!(got[0], "CommentAdded");
    assert_eq!(got.last().map(String::as_str), Some("Created"));
    assert!(got.contains(&"SprintAssigned".to_string()));
    assert!(got.contains(&"PriorityChanged".to_string()));
    assert_eq!(got.iter().filter(|a| *a == "LabelAdded").count(), 2);

    let feed = json(d, &["user", "activity", "--limit", "3"]);
    assert_eq!(feed["limit"], 3);
    assert_eq!(feed["activities"].as_array().map(Vec::len), Some(3));
    assert_eq!(feed["activities"][0]["type"], "item");
    assert_eq!(feed["activities"][0]["action"], "CommentAdded");
    // Item create, sprint create, priority, sprint assign, item added,
    // two labels and the comment.
    assert_eq!(feed["total"], 8);

    let everything = json(d, &["user", "activity", EMAIL, "--limit", "0"]);
    assert_eq!(everything["activities"].as_array().map(Vec::len), Some(8));
}

#[test]
fn unassigned_filter_and_sprint_removal() {
    let dir = setup();
    let d = dir.path();
    let a = create_item(d, "A", "1");
    let b = create_item(d, "B", "1");
    let sprint = create_sprint(d, "Sprint 1");
    json(d, &["sprint", "add", &sprint, &a]);

    let unassigned = json(d, &["item", "list", "--sprint", "none"]);
    assert_eq!(unassigned["total"], 1);
    assert_eq!(unassigned["items"][0]["id"], b.as_str());

    let in_sprint = json(d, &["item", "list", "--sprint", &sprint]);
    assert_eq!(in_sprint["total"], 1);
    assert_eq!(in_sprint["items"][0]["sprint"]["name"], "Sprint 1");

    let after = json(d, &["sprint", "remove", &sprint, &a]);
    assert_eq!(after["total_items"], 0);
    let item = json(d, &["item", "show", &a]);
    assert!(item["sprint_id"].is_null());
}

#[test]
fn positions_increase_within_project() {
    let dir = setup();
    let d = dir.path();
    create_item(d, "first", "1");
    create_item(d, "second", "1");
    let page = json(d, &["item", "list", "--project", "CORE", "--limit", "1"]);
    assert_eq!(page["total"], 2);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().map(Vec::len), Some(1));

    let all = json(d, &["item", "list", "--project", "CORE"]);
    let positions: Vec<i64> = all["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|i| i["position"].as_i64().expect("position"))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 2, "positions must be distinct: {positions:?}");
}

#[test]
fn text_output_lists_projects() {
    let dir = setup();
    bl_cmd(dir.path())
        .args(["--format", "text", "project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CORE").and(predicate::str::contains("Core")));
}

#[test]
fn db_flag_points_at_a_separate_store() {
    let dir = setup();
    let other = dir.path().join("elsewhere/other.db");
    let other = other.to_str().expect("utf8 path");

    let page = json(dir.path(), &["--db", other, "project", "list"]);
    assert_eq!(page["total"], 0);
    assert!(Path::new(other).exists());

    let page = json(dir.path(), &["project", "list"]);
    assert_eq!(page["total"], 1);
}
