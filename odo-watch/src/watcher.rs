//! Watch loop: push once, then push again after each quiet period that
//! follows a burst of filesystem changes.

use std::collections::BTreeSet;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use odo_sync::{push, Console, IgnoreRuleSet, OrchestrationClient, PushPlan};

use crate::error::{io_err, WatchError};

/// Quiet period after the last change before a push starts.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// What a watch session did before it was stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Pushes triggered by file changes (the initial push is not counted).
    pub pushes: usize,
    pub failures: usize,
}

/// Changed paths waiting for the quiet period to pass.
#[derive(Debug)]
pub struct PendingChanges {
    delay: Duration,
    paths: BTreeSet<String>,
    due_at: Option<Instant>,
}

impl PendingChanges {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            paths: BTreeSet::new(),
            due_at: None,
        }
    }

    /// Record a change; every new change restarts the quiet period.
    pub fn record(&mut self, path: String, now: Instant) {
        self.paths.insert(path);
        self.due_at = Some(now + self.delay);
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.due_at
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.due_at.is_some_and(|due| now >= due)
    }

    /// Take the batch and reset.
    pub fn take(&mut self) -> Vec<String> {
        self.due_at = None;
        std::mem::take(&mut self.paths).into_iter().collect()
    }
}

/// Push once, then push again whenever non-ignored files under the source
/// root change, until `shutdown` resolves.
///
/// Failed pushes after the first are reported and watching continues; the
/// index is only advanced by successful pushes, so the next one retries.
pub async fn watch<S>(
    client: &dyn OrchestrationClient,
    plan: &PushPlan,
    console: &Console,
    delay: Duration,
    shutdown: S,
) -> Result<WatchSummary, WatchError>
where
    S: Future<Output = ()>,
{
    let root = fs::canonicalize(&plan.source_root).map_err(|e| io_err(&plan.source_root, e))?;

    push(client, plan, console)
        .await
        .map_err(WatchError::InitialPush)?;
    let plan = &followup_plan(plan);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    console.line(&format!(
        "Waiting for something to change in {}",
        plan.source_root.display()
    ));
    tracing::info!(root = %root.display(), "watching for changes");

    let mut pending = PendingChanges::new(delay);
    let mut summary = WatchSummary::default();
    tokio::pin!(shutdown);

    loop {
        let due_at = pending.due_at();
        tokio::select! {
            _ = &mut shutdown => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                for path in relevant_paths(&event.paths, &root, &plan.ignore) {
                    tracing::debug!(file = %path, "change detected");
                    pending.record(path, Instant::now());
                }
            }
            _ = sleep_until(due_at), if due_at.is_some() => {
                let batch = pending.take();
                console.line(&format!("File changes detected: {}", batch.join(", ")));
                match push(client, plan, console).await {
                    Ok(report) => {
                        summary.pushes += 1;
                        tracing::info!(
                            changed = report.changed.len(),
                            deleted = report.deleted.len(),
                            "watch-triggered push completed"
                        );
                    }
                    Err(err) => {
                        summary.failures += 1;
                        tracing::error!(error = %err, "watch-triggered push failed");
                        console.line(&format!("Push failed: {err}"));
                    }
                }
                console.line(&format!(
                    "Waiting for something to change in {}",
                    plan.source_root.display()
                ));
            }
        }
    }

    Ok(summary)
}

/// Plan for pushes after the first one.
///
/// A forced first push (fresh resources) must not force every later push;
/// explicit file lists are always sent.
pub fn followup_plan(plan: &PushPlan) -> PushPlan {
    let mut followup = plan.clone();
    followup.force_push = plan.force_push && plan.files.is_some();
    followup
}

async fn sleep_until(due_at: Option<Instant>) {
    if let Some(due_at) = due_at {
        tokio::time::sleep_until(due_at).await;
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Non-ignored `/`-separated paths under `root` among `paths`.
fn relevant_paths(paths: &[PathBuf], root: &Path, ignore: &IgnoreRuleSet) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| {
            let rel = path.strip_prefix(root).ok()?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            (!key.is_empty() && !ignore.is_ignored(&key)).then_some(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn rapid_changes_collapse_into_one_batch() {
        let mut pending = PendingChanges::new(Duration::from_millis(100));
        let mut batches = Vec::new();

        for name in ["a.js", "b.js", "a.js", "c.js"] {
            pending.record(name.to_string(), Instant::now());
            advance(Duration::from_millis(30)).await;
            if pending.is_due(Instant::now()) {
                batches.push(pending.take());
            }
        }
        assert!(batches.is_empty(), "quiet period restarts on every change");

        advance(Duration::from_millis(100)).await;
        assert!(pending.is_due(Instant::now()));
        assert_eq!(pending.take(), vec!["a.js", "b.js", "c.js"]);
        assert!(pending.due_at().is_none());
    }

    #[test]
    fn ignored_and_outside_paths_are_dropped() {
        let root = Path::new("/work/api");
        let ignore = IgnoreRuleSet::from_patterns(["*.log"]).unwrap();
        let paths = vec![
            PathBuf::from("/work/api/src/main.js"),
            PathBuf::from("/work/api/.odo/odo-file-index.json"),
            PathBuf::from("/work/api/server.log"),
            PathBuf::from("/work/other/file.js"),
            PathBuf::from("/work/api"),
        ];
        assert_eq!(relevant_paths(&paths, root, &ignore), vec!["src/main.js"]);
    }

    #[test]
    fn removals_are_relevant() {
        assert!(is_relevant_event_kind(&EventKind::Remove(
            notify::event::RemoveKind::File
        )));
        assert!(!is_relevant_event_kind(&EventKind::Access(
            notify::event::AccessKind::Any
        )));
    }
}
