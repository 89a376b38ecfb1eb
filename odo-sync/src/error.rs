//! Error types for odo-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed error carried across the orchestration boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by an [`OrchestrationClient`](crate::client::OrchestrationClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// No instance matching the selector reached the running state in time.
    #[error("no running instance matched '{selector}' within {waited:?}")]
    Timeout { selector: String, waited: Duration },

    /// A remote command ran to completion but exited non-zero.
    #[error("command exited with code {code}: {message}")]
    ExitStatus { code: i32, message: String },

    /// Any failure inside the client implementation (API, websocket, stream).
    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl ClientError {
    pub fn backend(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ClientError::Backend {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// All errors that can arise from a push.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local filesystem unreadable or unwritable, with annotated path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file index on disk could not be read or written as JSON.
    #[error("file index error at {path}: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An ignore rule is not a valid glob.
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The workload never reached the running state within the wait budget.
    #[error("component is not available: {source}")]
    TargetUnavailable {
        selector: String,
        #[source]
        source: ClientError,
    },

    /// One or more deletions could not be propagated; nothing was transferred.
    #[error("unable to propagate file deletions {paths:?}: {source}")]
    DeletePropagation {
        paths: Vec<String>,
        #[source]
        source: ClientError,
    },

    /// Writing or streaming the archive failed.
    #[error("unable to push files to {destination}: {source}")]
    Transfer {
        destination: String,
        #[source]
        source: BoxError,
    },

    /// A triggered command failed; `output` holds everything streamed so far.
    #[error("unable to run `{command}`: {source}")]
    RemoteCommand {
        command: String,
        output: String,
        #[source]
        source: ClientError,
    },

    /// Any other orchestration failure.
    #[error("orchestration error: {0}")]
    Client(#[from] ClientError),

    /// The local component config is unusable.
    #[error("component config error: {0}")]
    Config(#[from] odo_core::ConfigError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
