//! The orchestration boundary.
//!
//! Everything the push workflow needs from the cluster goes through
//! [`OrchestrationClient`]. The Kubernetes implementation lives in
//! `odo-cluster`; tests use [`crate::testing::FakeClient`].

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// A running workload instance resolved from a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub namespace: Option<String>,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => self.name.fmt(f),
        }
    }
}

/// Receives raw output chunks from a remote command.
pub type OutputSender = mpsc::Sender<Vec<u8>>;

/// A readable gzip tar stream handed to the client.
pub type ArchiveReader = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Wait until an instance matching `selector` is running and return it.
    ///
    /// Fails with [`ClientError::Timeout`] once the wait budget is spent.
    async fn resolve_running_instance(&self, selector: &str) -> Result<Instance, ClientError>;

    /// Remove `paths` (relative, `/`-separated) under every directory in `roots`.
    async fn delete_files(
        &self,
        instance: &Instance,
        container: &str,
        paths: &[String],
        roots: &[String],
    ) -> Result<(), ClientError>;

    /// Extract a gzip tar stream into `destination`, creating it if needed.
    async fn stream_archive_to(
        &self,
        instance: &Instance,
        container: &str,
        destination: &str,
        archive: ArchiveReader,
    ) -> Result<(), ClientError>;

    /// Run `command` and forward its output as it arrives.
    ///
    /// Returns once the command has exited and both streams are drained.
    async fn exec_with_streaming(
        &self,
        instance: &Instance,
        container: &str,
        command: &[String],
        stdout: OutputSender,
        stderr: OutputSender,
    ) -> Result<(), ClientError>;
}
