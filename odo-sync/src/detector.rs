//! Change detection against the last successful push.
//!
//! A scan walks the source root, fingerprints every non-ignored file and
//! diffs the result against the stored [`FileIndex`]:
//!
//! - `changed`: not in the index, or the content digest differs
//! - `deleted`: in the index, gone from disk, and not ignored
//!
//! Files whose size and mtime match the index reuse the stored digest, so
//! unchanged trees are never re-read. Scanning has no side effects; the new
//! snapshot is written only through [`Scan::commit`].

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{io_err, SyncError};
use crate::ignore::IgnoreRuleSet;
use crate::index::{self, FileEntry, FileIndex};

/// Result of comparing the source tree with the stored index.
#[derive(Debug, Clone)]
pub struct Scan {
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    snapshot: FileIndex,
}

impl Scan {
    /// `true` when there is nothing to push.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Every non-ignored file currently present, sorted.
    pub fn files(&self) -> Vec<String> {
        self.snapshot.files.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> &FileIndex {
        &self.snapshot
    }

    /// Record the snapshot as the new index. Call only after a successful push.
    pub fn commit(mut self, source_root: &Path) -> Result<(), SyncError> {
        self.snapshot.synced_at = Utc::now();
        index::save_at(source_root, &self.snapshot)
    }
}

/// Scan `source_root` against its stored index.
pub fn scan(source_root: &Path, rules: &IgnoreRuleSet) -> Result<Scan, SyncError> {
    let previous = index::load_at(source_root)?;
    scan_against(source_root, rules, &previous)
}

/// Scan `source_root` against an explicit previous index.
pub fn scan_against(
    source_root: &Path,
    rules: &IgnoreRuleSet,
    previous: &FileIndex,
) -> Result<Scan, SyncError> {
    let snapshot = snapshot(source_root, rules, previous)?;

    let mut changed = Vec::new();
    for (path, entry) in &snapshot.files {
        match previous.get(path) {
            Some(old) if old.digest == entry.digest => {}
            _ => changed.push(path.clone()),
        }
    }

    let deleted: Vec<String> = previous
        .files
        .keys()
        .filter(|path| !snapshot.files.contains_key(*path) && !rules.is_ignored(path))
        .cloned()
        .collect();

    tracing::debug!(
        root = %source_root.display(),
        changed = changed.len(),
        deleted = deleted.len(),
        "scan complete"
    );
    Ok(Scan {
        changed,
        deleted,
        snapshot,
    })
}

/// Fingerprint every non-ignored file under `source_root`.
///
/// Symlinks are recorded as entries of their own and never followed.
pub fn snapshot(
    source_root: &Path,
    rules: &IgnoreRuleSet,
    previous: &FileIndex,
) -> Result<FileIndex, SyncError> {
    std::fs::read_dir(source_root).map_err(|e| io_err(source_root, e))?;

    let mut current = FileIndex::empty();
    let walker = WalkDir::new(source_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match relative_key(source_root, entry.path()) {
            Some(rel) => !rules.is_ignored(&rel),
            None => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| source_root.to_path_buf());
                // Files removed mid-walk are simply absent from the snapshot.
                if err.io_error().map(|e| e.kind()) == Some(ErrorKind::NotFound) {
                    continue;
                }
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                return Err(io_err(path, source));
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let Some(rel) = relative_key(source_root, entry.path()) else {
            continue;
        };

        let metadata = match entry.path().symlink_metadata() {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(entry.path(), err)),
        };
        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| io_err(entry.path(), e))?
            .into();
        let size = metadata.len();

        let digest = match previous.get(&rel) {
            Some(old) if old.size == size && old.modified == modified => old.digest.clone(),
            _ if file_type.is_symlink() => hash_link(entry.path())?,
            _ => hash_file(entry.path())?,
        };

        current.insert(
            rel,
            FileEntry {
                digest,
                size,
                modified,
            },
        );
    }

    Ok(current)
}

/// `/`-separated path of `path` relative to `root`; `None` for the root itself.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn hash_file(path: &Path) -> Result<String, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

fn hash_link(path: &Path) -> Result<String, SyncError> {
    let target = std::fs::read_link(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(b"symlink:");
    hasher.update(target.to_string_lossy().as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn first_scan_reports_everything_changed() {
        let root = TempDir::new().unwrap();
        write(root.path(), "a.txt", "a");
        write(root.path(), "src/b.txt", "b");

        let scan = scan(root.path(), &IgnoreRuleSet::default()).unwrap();
        assert_eq!(scan.changed, vec!["a.txt", "src/b.txt"]);
        assert!(scan.deleted.is_empty());
    }

    #[test]
    fn unreadable_root_is_io_error() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("nope");
        let err = scan(&missing, &IgnoreRuleSet::default()).unwrap_err();
        assert!(matches!(err, SyncError::Io { ref path, .. } if path == &missing));
    }

    #[test]
    fn touch_without_content_change_is_not_reported() {
        let root = TempDir::new().unwrap();
        write(root.path(), "a.txt", "same");
        scan(root.path(), &IgnoreRuleSet::default())
            .unwrap()
            .commit(root.path())
            .unwrap();

        let later = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(60));
        set_file_mtime(root.path().join("a.txt"), later).unwrap();

        let scan = scan(root.path(), &IgnoreRuleSet::default()).unwrap();
        assert!(scan.is_empty(), "got {scan:?}");
    }

    #[test]
    fn same_size_and_mtime_reuses_stored_digest() {
        let root = TempDir::new().unwrap();
        write(root.path(), "a.txt", "aaaa");
        let first = scan(root.path(), &IgnoreRuleSet::default()).unwrap();
        let mut stored = first.snapshot().clone();
        stored.files.get_mut("a.txt").unwrap().digest = "recorded".to_string();

        let again = scan_against(root.path(), &IgnoreRuleSet::default(), &stored).unwrap();
        assert_eq!(again.snapshot().get("a.txt").unwrap().digest, "recorded");
        assert!(again.changed.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_recorded_not_followed() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "big/file.bin", "outside");
        std::os::unix::fs::symlink(outside.path().join("big"), root.path().join("link")).unwrap();

        let scan = scan(root.path(), &IgnoreRuleSet::default()).unwrap();
        assert_eq!(scan.changed, vec!["link"]);
    }

    #[test]
    fn relative_key_uses_forward_slashes() {
        let root = Path::new("/src");
        assert_eq!(
            relative_key(root, Path::new("/src/a/b.txt")).as_deref(),
            Some("a/b.txt")
        );
        assert_eq!(relative_key(root, Path::new("/src")), None);
    }
}
