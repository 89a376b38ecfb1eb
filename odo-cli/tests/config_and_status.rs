use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

use odo_core::config;
use odo_sync::IgnoreRuleSet;

fn odo_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("odo").expect("odo binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write file");
}

fn status_json(home: &Path, context: &Path, extra: &[&str]) -> Value {
    let output = odo_cmd(home)
        .args(["status", "--json", "--context"])
        .arg(context)
        .args(extra)
        .output()
        .expect("run odo status");
    assert!(
        output.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("status JSON")
}

fn strings(value: &Value) -> Vec<String> {
    let mut items: Vec<String> = value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect();
    items.sort();
    items
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_set_then_view_shows_value() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");

    odo_cmd(home.path())
        .args(["config", "set", "name", "frontend", "--context"])
        .arg(context.path())
        .assert()
        .success()
        .stdout(contains("name = frontend"));
    odo_cmd(home.path())
        .args(["config", "set", "Ports", "8080,8443", "--context"])
        .arg(context.path())
        .assert()
        .success();

    assert!(config::config_path_at(context.path()).exists());

    odo_cmd(home.path())
        .args(["config", "view", "--context"])
        .arg(context.path())
        .assert()
        .success()
        .stdout(contains("frontend"))
        .stdout(contains("8080,8443"))
        .stdout(contains("/projects"));
}

#[test]
fn config_unset_clears_value() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");

    config::set_at(context.path(), "name", "api").expect("set name");
    config::set_at(context.path(), "buildcommand", "make build").expect("set build");

    odo_cmd(home.path())
        .args(["config", "unset", "buildcommand", "--context"])
        .arg(context.path())
        .assert()
        .success();

    let saved = config::load_at(context.path()).expect("load");
    assert!(saved.component.build.is_none());
    assert_eq!(
        saved.component.name.map(|n| n.to_string()).as_deref(),
        Some("api")
    );
}

#[test]
fn config_set_rejects_unknown_parameter() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");

    odo_cmd(home.path())
        .args(["config", "set", "colour", "blue", "--context"])
        .arg(context.path())
        .assert()
        .failure()
        .stderr(contains("unknown parameter 'colour'"));
    assert!(!config::config_path_at(context.path()).exists());
}

#[test]
fn config_unset_without_config_fails() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");

    odo_cmd(home.path())
        .args(["config", "unset", "name", "--context"])
        .arg(context.path())
        .assert()
        .failure()
        .stderr(contains("no component config found"));
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[test]
fn status_lists_pending_files_without_index() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");
    write(context.path(), "a.txt", "alpha");
    write(context.path(), "src/main.rs", "fn main() {}");
    write(context.path(), ".git/HEAD", "ref: refs/heads/main");

    let report = status_json(home.path(), context.path(), &[]);

    assert_eq!(strings(&report["changed"]), vec!["a.txt", "src/main.rs"]);
    assert!(strings(&report["deleted"]).is_empty());
    assert_eq!(report["last_sync_age"], "never");
    assert!(report["last_sync_at"].is_null());
    assert!(report["component"].is_null());
}

#[test]
fn status_honours_ignore_flag_and_config_ignores() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");
    config::set_at(context.path(), "name", "web").expect("set name");
    config::set_at(context.path(), "ignore", "*.log").expect("set ignore");
    write(context.path(), "index.js", "console.log(1)");
    write(context.path(), "debug.log", "noise");
    write(context.path(), "dist/bundle.js", "minified");

    let report = status_json(home.path(), context.path(), &["--ignore", "dist"]);

    assert_eq!(strings(&report["changed"]), vec!["index.js"]);
    assert_eq!(report["component"], "web");
}

#[test]
fn status_compares_against_last_push() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");
    write(context.path(), "keep.txt", "same");
    write(context.path(), "edit.txt", "before");
    write(context.path(), "gone.txt", "bye");

    let rules = IgnoreRuleSet::load_from_dir(context.path()).expect("rules");
    odo_sync::scan(context.path(), &rules)
        .expect("scan")
        .commit(context.path())
        .expect("commit");

    write(context.path(), "edit.txt", "after, and longer");
    fs::remove_file(context.path().join("gone.txt")).expect("remove");

    let report = status_json(home.path(), context.path(), &[]);

    assert_eq!(strings(&report["changed"]), vec!["edit.txt"]);
    assert_eq!(strings(&report["deleted"]), vec!["gone.txt"]);
    assert!(report["last_sync_at"].is_string());
    assert_ne!(report["last_sync_age"], "never");
}

#[test]
fn status_table_reports_nothing_to_push() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");

    odo_cmd(home.path())
        .args(["status", "--context"])
        .arg(context.path())
        .assert()
        .success()
        .stdout(contains("nothing to push"));

    // status is read-only
    assert!(!context.path().join(".odo").exists());
}

#[test]
fn status_table_lists_changes() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");
    write(context.path(), "app.py", "print('hi')");

    odo_cmd(home.path())
        .args(["status", "--context"])
        .arg(context.path())
        .assert()
        .success()
        .stdout(contains("app.py"))
        .stdout(contains("modified"))
        .stdout(contains("1 changed, 0 deleted"));
}

// ---------------------------------------------------------------------------
// push / watch preconditions
// ---------------------------------------------------------------------------

#[test]
fn push_without_config_points_at_config_set() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");

    odo_cmd(home.path())
        .args(["push", "--context"])
        .arg(context.path())
        .assert()
        .failure()
        .stderr(contains("odo config set name"));
}

#[test]
fn watch_without_name_points_at_config_set() {
    let home = TempDir::new().expect("home");
    let context = TempDir::new().expect("context");
    config::set_at(context.path(), "image", "node:20").expect("set image");

    odo_cmd(home.path())
        .args(["watch", "--context"])
        .arg(context.path())
        .assert()
        .failure()
        .stderr(contains("odo config set name"));
}

#[test]
fn push_with_missing_context_fails() {
    let home = TempDir::new().expect("home");
    let missing = home.path().join("does-not-exist");

    odo_cmd(home.path())
        .args(["push", "--context"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("is not accessible"));
}
