//! # odo-sync
//!
//! Incremental file sync from a local source tree into a running component.
//!
//! - [`detector`] finds changed and deleted files against the [`index`]
//! - [`transport`] propagates deletions and streams a gzip tar of changes
//! - [`trigger`] runs build and reload commands with streamed output
//! - [`pipeline`] ties the three together; call [`push`] for one push
//!
//! All cluster access goes through [`OrchestrationClient`].

pub mod archive;
pub mod client;
pub mod detector;
pub mod error;
pub mod ignore;
pub mod index;
pub mod pipeline;
pub mod progress;
#[doc(hidden)]
pub mod testing;
pub mod transport;
pub mod trigger;

pub use client::{ArchiveReader, Instance, OrchestrationClient, OutputSender};
pub use detector::{scan, Scan};
pub use error::{BoxError, ClientError, SyncError};
pub use ignore::IgnoreRuleSet;
pub use index::{FileEntry, FileIndex};
pub use pipeline::{push, PushPlan, PushReport, TriggerCommand};
pub use progress::{Console, Status};
pub use transport::{sync_files, SyncOutcome, SyncRequest, SyncTarget};
pub use trigger::trigger_and_stream;
