//! # odo-watch
//!
//! `odo watch`: push once, then re-push whenever the source tree changes.
//!
//! Filesystem events are filtered through the component's ignore rules and
//! collapsed over a quiet period before each push.

pub mod error;
pub mod watcher;

pub use error::WatchError;
pub use watcher::{followup_plan, watch, PendingChanges, WatchSummary, DEFAULT_DELAY};
