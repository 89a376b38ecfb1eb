//! File index: per-file fingerprints recorded at the last successful push.
//!
//! Persists a `FileIndex` JSON document at
//! `<source_root>/.odo/odo-file-index.json`.
//! Writes use an atomic `.tmp` + rename so an interrupted push never leaves a
//! half-written index behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use odo_core::config::ODO_DIR;

use crate::error::{io_err, SyncError};

/// Fingerprint of a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// SHA-256 hex digest of the content (or of the link target for symlinks).
    pub digest: String,
    pub size: u64,
    /// Last modification time, kept to the nanosecond.
    pub modified: DateTime<Utc>,
}

/// On-disk index payload, keyed by `/`-separated path relative to the source root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileIndex {
    pub synced_at: DateTime<Utc>,
    pub files: BTreeMap<String, FileEntry>,
}

impl FileIndex {
    pub fn empty() -> Self {
        Self {
            synced_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn insert(&mut self, path: String, entry: FileEntry) {
        self.files.insert(path, entry);
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// `<source_root>/.odo/odo-file-index.json`
pub fn index_path_at(source_root: &Path) -> PathBuf {
    source_root.join(ODO_DIR).join("odo-file-index.json")
}

/// Load the index for `source_root`.
///
/// Returns an empty index if the file does not yet exist (first push).
pub fn load_at(source_root: &Path) -> Result<FileIndex, SyncError> {
    let path = index_path_at(source_root);
    if !path.exists() {
        return Ok(FileIndex::empty());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|e| SyncError::Index { path, source: e })
}

/// Save the index for `source_root` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(source_root: &Path, index: &FileIndex) -> Result<(), SyncError> {
    let path = index_path_at(source_root);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid index path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(index).map_err(|e| SyncError::Index {
        path: path.clone(),
        source: e,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

/// Human-readable age of `timestamp`, e.g. `42s`, `5m`, `3h`, `2d`.
pub fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
