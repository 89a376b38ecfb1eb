//! Watch sessions against the recording fake client.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use odo_sync::testing::{FakeClient, SharedBuffer};
use odo_sync::{Console, IgnoreRuleSet, PushPlan, SyncError, SyncTarget};
use odo_watch::{followup_plan, watch, WatchError};
use tempfile::TempDir;

fn plan(root: &Path) -> PushPlan {
    PushPlan {
        source_root: root.to_path_buf(),
        ignore: IgnoreRuleSet::from_patterns(["*.swp"]).expect("ignore rules"),
        target: SyncTarget {
            selector: "app.odo.dev/component=web".to_string(),
            container: "build".to_string(),
            destination: "/projects/web".to_string(),
            mirror_roots: Vec::new(),
        },
        force_push: false,
        build: None,
        reload: None,
        show_log: false,
        files: None,
    }
}

#[tokio::test]
async fn initial_push_runs_before_watching() {
    let root = TempDir::new().expect("root");
    fs::write(root.path().join("index.html"), "<h1>hi</h1>").expect("write");
    let client = FakeClient::new();
    let buf = SharedBuffer::default();
    let console = Console::from_writer(buf.clone());

    let summary = watch(
        &client,
        &plan(root.path()),
        &console,
        Duration::from_millis(50),
        async {},
    )
    .await
    .expect("watch");

    assert_eq!(summary.pushes, 0);
    assert_eq!(summary.failures, 0);
    assert_eq!(client.archived_paths(), vec!["index.html"]);
    assert!(buf.contents().contains("Waiting for something to change in"));
}

#[tokio::test]
async fn failed_initial_push_ends_the_session() {
    let root = TempDir::new().expect("root");
    fs::write(root.path().join("main.go"), "package main").expect("write");
    let client = FakeClient::new().never_ready();
    let console = Console::from_writer(SharedBuffer::default());

    let err = watch(
        &client,
        &plan(root.path()),
        &console,
        Duration::from_millis(50),
        async {},
    )
    .await
    .expect_err("component never becomes ready");

    assert!(matches!(
        err,
        WatchError::InitialPush(SyncError::TargetUnavailable { .. })
    ));
    assert_eq!(client.call_kinds(), vec!["resolve"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_change_triggers_another_push() {
    let root = TempDir::new().expect("root");
    fs::write(root.path().join("app.js"), "v1").expect("write");
    let client = FakeClient::new();
    let console = Console::from_writer(SharedBuffer::default());

    let late = root.path().join("late.js");
    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        fs::write(late, "added while watching").expect("write late file");
    });

    let started = Instant::now();
    let shutdown = async {
        while started.elapsed() < Duration::from_secs(15) {
            if client.archived_paths().iter().any(|p| p == "late.js") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    let summary = watch(
        &client,
        &plan(root.path()),
        &console,
        Duration::from_millis(100),
        shutdown,
    )
    .await
    .expect("watch");
    writer.join().expect("writer thread");

    assert!(summary.pushes >= 1);
    assert_eq!(summary.failures, 0);
    let archived = client.archived_paths();
    assert_eq!(archived[0], "app.js");
    assert!(archived.contains(&"late.js".to_string()));
    assert!(!archived.iter().skip(1).any(|p| p == "app.js"));
}

#[test]
fn only_explicit_file_plans_stay_forced_after_the_first_push() {
    let root = TempDir::new().expect("root");

    let mut fresh = plan(root.path());
    fresh.force_push = true;
    assert!(!followup_plan(&fresh).force_push);

    let mut binary = plan(root.path());
    binary.force_push = true;
    binary.files = Some(vec!["app.jar".to_string()]);
    assert!(followup_plan(&binary).force_push);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn touch_after_forced_initial_push_sends_nothing() {
    let root = TempDir::new().expect("root");
    fs::write(root.path().join("app.js"), "v1").expect("write");
    let client = FakeClient::new();
    let buf = SharedBuffer::default();
    let console = Console::from_writer(buf.clone());

    let mut forced = plan(root.path());
    forced.force_push = true;

    let touched = root.path().join("app.js");
    let writer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(500));
        fs::write(touched, "v1").expect("rewrite with same content");
    });

    let started = Instant::now();
    let shutdown = async {
        while started.elapsed() < Duration::from_secs(15) {
            if buf.contents().matches("Waiting for something to change").count() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    let summary = watch(&client, &forced, &console, Duration::from_millis(100), shutdown)
        .await
        .expect("watch");
    writer.join().expect("writer thread");

    assert!(summary.pushes >= 1, "the touch should have triggered a push");
    assert_eq!(client.archived_paths(), vec!["app.js"]);
    assert_eq!(
        client.call_kinds().iter().filter(|k| **k == "archive").count(),
        1
    );
}
