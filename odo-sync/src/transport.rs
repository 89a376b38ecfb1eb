//! Remote sync transport.
//!
//! One call to [`sync_files`] moves a component's workload from the last
//! synced state to the current local state:
//!
//! 1. nothing changed and not forced: return without contacting the cluster
//! 2. wait for a running instance
//! 3. propagate deletions to the destination and every mirror root
//! 4. stream a gzip tar of the changed files (or the whole tree when forced)
//!
//! Deletions are always applied before the archive is sent, and a failed
//! deletion aborts the sync before any transfer.

use std::path::Path;

use tokio::runtime::Handle;

use crate::archive::{self, BlockingPipeWriter};
use crate::client::{ArchiveReader, Instance, OrchestrationClient};
use crate::error::{BoxError, ClientError, SyncError};
use crate::ignore::IgnoreRuleSet;
use crate::progress::Console;

/// In-memory pipe between the archive producer and the client.
const PIPE_CAPACITY: usize = 64 * 1024;

const SYNC_MESSAGE: &str = "Syncing files to the component";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where synced files land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// Label selector of the workload.
    pub selector: String,
    /// Container that receives the files.
    pub container: String,
    /// Directory mirroring the source root.
    pub destination: String,
    /// Further directories that mirror the source layout.
    pub mirror_roots: Vec<String>,
}

impl SyncTarget {
    /// Destination plus every mirror root, without duplicates.
    pub fn delete_roots(&self) -> Vec<String> {
        let mut roots = vec![self.destination.clone()];
        for root in &self.mirror_roots {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }
}

/// What to sync.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    pub source_root: &'a Path,
    /// Relative paths to transfer.
    pub changed: &'a [String],
    /// Relative paths to remove remotely.
    pub deleted: &'a [String],
    /// Transfer even when nothing changed; with an empty `changed` set the
    /// whole non-ignored tree is sent.
    pub force_push: bool,
    pub ignore: &'a IgnoreRuleSet,
}

impl SyncRequest<'_> {
    fn is_noop(&self) -> bool {
        !self.force_push && self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The instance files were pushed to; `None` when nothing was contacted.
    pub instance: Option<Instance>,
    pub deleted: Vec<String>,
    pub transferred: Vec<String>,
}

impl SyncOutcome {
    /// `true` when no remote state was touched.
    pub fn is_noop(&self) -> bool {
        self.deleted.is_empty() && self.transferred.is_empty()
    }
}

// ---------------------------------------------------------------------------
// sync_files
// ---------------------------------------------------------------------------

/// Bring the workload in line with the local tree.
pub async fn sync_files(
    client: &dyn OrchestrationClient,
    target: &SyncTarget,
    request: SyncRequest<'_>,
    console: &Console,
) -> Result<SyncOutcome, SyncError> {
    if request.is_noop() {
        tracing::debug!("no changes and not forced, skipping sync");
        return Ok(SyncOutcome::default());
    }

    let status = console.status(SYNC_MESSAGE);

    let instance = client
        .resolve_running_instance(&target.selector)
        .await
        .map_err(|source| SyncError::TargetUnavailable {
            selector: target.selector.clone(),
            source,
        })?;
    tracing::info!(instance = %instance, "resolved running instance");

    let mut outcome = SyncOutcome {
        instance: Some(instance.clone()),
        ..SyncOutcome::default()
    };

    if !request.deleted.is_empty() {
        let roots = target.delete_roots();
        tracing::debug!(files = ?request.deleted, roots = ?roots, "propagating deletions");
        client
            .delete_files(&instance, &target.container, request.deleted, &roots)
            .await
            .map_err(|source| SyncError::DeletePropagation {
                paths: request.deleted.to_vec(),
                source,
            })?;
        outcome.deleted = request.deleted.to_vec();
    }

    if request.changed.is_empty() && !request.force_push {
        status.succeed();
        return Ok(outcome);
    }

    let files = if request.changed.is_empty() {
        tracing::debug!("forced push with no changes, sending the full tree");
        full_tree(request.source_root, request.ignore)?
    } else {
        request
            .changed
            .iter()
            .filter(|path| !request.ignore.is_ignored(path))
            .cloned()
            .collect()
    };

    transfer(client, &instance, target, request.source_root, &files).await?;
    outcome.transferred = files;

    status.succeed();
    Ok(outcome)
}

fn full_tree(source_root: &Path, ignore: &IgnoreRuleSet) -> Result<Vec<String>, SyncError> {
    let previous = crate::index::FileIndex::empty();
    let snapshot = crate::detector::snapshot(source_root, ignore, &previous)?;
    Ok(snapshot.files.into_keys().collect())
}

/// Stream `files` as a gzip tar into the target destination.
///
/// The archive is written on a blocking thread into a bounded pipe while the
/// client consumes the other end, so the producer and the transfer finish
/// together or fail together.
async fn transfer(
    client: &dyn OrchestrationClient,
    instance: &Instance,
    target: &SyncTarget,
    source_root: &Path,
    files: &[String],
) -> Result<(), SyncError> {
    let transfer_err = |source: BoxError| SyncError::Transfer {
        destination: target.destination.clone(),
        source,
    };

    let (write_half, read_half) = tokio::io::duplex(PIPE_CAPACITY);
    let root = source_root.to_path_buf();
    let paths = files.to_vec();
    let handle = Handle::current();

    let producer = tokio::task::spawn_blocking(move || {
        let writer = BlockingPipeWriter::new(write_half, handle);
        let writer = archive::write_archive(&root, &paths, writer)?;
        writer.shutdown()
    });

    let reader: ArchiveReader = Box::new(read_half);
    let consumed = client
        .stream_archive_to(instance, &target.container, &target.destination, reader)
        .await;
    let produced = producer.await;

    // A consumer failure usually surfaces on the producer as a broken pipe, so
    // the consumer's error is the one worth reporting.
    consumed.map_err(|e: ClientError| transfer_err(Box::new(e)))?;
    match produced {
        Ok(Ok(())) => {}
        Ok(Err(io)) => return Err(transfer_err(Box::new(io))),
        Err(join) => return Err(transfer_err(Box::new(join))),
    }

    tracing::info!(
        files = files.len(),
        destination = %target.destination,
        "archive transferred"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_roots_include_destination_first_without_duplicates() {
        let target = SyncTarget {
            selector: "app.odo.dev/component=api".to_string(),
            container: "build".to_string(),
            destination: "/projects/api".to_string(),
            mirror_roots: vec![
                "/opt/app-root/src".to_string(),
                "/projects/api".to_string(),
            ],
        };
        assert_eq!(
            target.delete_roots(),
            vec!["/projects/api", "/opt/app-root/src"]
        );
    }

    #[test]
    fn outcome_default_is_noop() {
        assert!(SyncOutcome::default().is_noop());
    }
}
