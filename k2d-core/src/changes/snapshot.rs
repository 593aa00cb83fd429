//! Content-hash snapshots for projects without git.
//!
//! A snapshot maps every project file (relative path) to its SHA-256 and size.
//! One snapshot is written per collection under `<meta>/snapshots/` and the
//! most recent one is the baseline for the next collection.

use super::{ChangeCollector, ChangeSet, SnapshotInfo};
use crate::diff::{diff_keyed, KeyedDiff};
use crate::error::Result;
use crate::types::{ChangeKind, FileChange, TrackingMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory names never descended into.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", "node_modules", "dist", ".next", "target"];

const SNAPSHOT_PREFIX: &str = "snapshot-";

/// Hash and size of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub hash: String,
    pub size: u64,
}

/// Point-in-time inventory of a project tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub files: BTreeMap<String, FileFingerprint>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Walk `root` and fingerprint every readable file.
    ///
    /// `skip_dirs` are directory names pruned anywhere in the tree;
    /// `skip_paths` are absolute paths pruned as a whole.
    pub fn capture(root: &Path, skip_dirs: &[String], skip_paths: &[PathBuf]) -> Snapshot {
        let mut files = BTreeMap::new();

        let walker = WalkDir::new(root).follow_links(false).into_iter();
        let entries = walker.filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                let name: &str = &name;
                if DEFAULT_EXCLUDES.contains(&name) || skip_dirs.iter().any(|d| d == name) {
                    return false;
                }
            }
            !skip_paths.iter().any(|p| p == entry.path())
        });

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            match fingerprint(entry.path()) {
                Ok(fp) => {
                    files.insert(relative_key(relative), fp);
                }
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable file");
                }
            }
        }

        Snapshot {
            files,
            timestamp: Utc::now(),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// Paths added, modified (hash differs) and deleted since `old`.
    pub fn diff(old: Option<&Snapshot>, new: &Snapshot) -> KeyedDiff<String> {
        diff_keyed(old.map(|s| &s.files), &new.files, |a, b| a.hash != b.hash)
    }

    /// Turn a diff into change records carrying the before/after hashes.
    pub fn to_changes(diff: &KeyedDiff<String>, old: Option<&Snapshot>, new: &Snapshot) -> Vec<FileChange> {
        let old_hash = |path: &str| old.and_then(|s| s.files.get(path)).map(|f| f.hash.clone());
        let new_hash = |path: &str| new.files.get(path).map(|f| f.hash.clone());

        let added = diff.added.iter().map(|path| FileChange {
            new_hash: new_hash(path),
            ..FileChange::new(path.clone(), ChangeKind::Added)
        });
        let modified = diff.modified.iter().map(|path| FileChange {
            old_hash: old_hash(path),
            new_hash: new_hash(path),
            ..FileChange::new(path.clone(), ChangeKind::Modified)
        });
        let deleted = diff.deleted.iter().map(|path| FileChange {
            old_hash: old_hash(path),
            ..FileChange::new(path.clone(), ChangeKind::Deleted)
        });

        added.chain(modified).chain(deleted).collect()
    }
}

fn relative_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn fingerprint(path: &Path) -> std::io::Result<FileFingerprint> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok(FileFingerprint {
        hash: hex::encode(hasher.finalize()),
        size,
    })
}

/// Write `snapshot` as `snapshot-<millis>.json` inside `dir`.
pub fn save(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{}{:013}.json",
        SNAPSHOT_PREFIX,
        snapshot.timestamp.timestamp_millis()
    ));
    std::fs::write(&path, serde_json::to_string_pretty(snapshot)?)?;
    Ok(path)
}

/// The most recent snapshot in `dir`, by file name. Absent or unreadable yields `None`.
pub fn load_latest(dir: &Path) -> Option<Snapshot> {
    let pattern = format!(
        "{}/{}*.json",
        glob::Pattern::escape(&dir.to_string_lossy()),
        SNAPSHOT_PREFIX
    );
    let latest = glob::glob(&pattern)
        .ok()?
        .filter_map(|p| p.ok())
        .max()?;

    let content = std::fs::read_to_string(&latest).ok()?;
    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = %latest.display(), error = %e, "Ignoring unreadable snapshot");
            None
        }
    }
}

/// Collects changes by diffing a fresh snapshot against the last saved one.
pub struct SnapshotCollector {
    root: PathBuf,
    meta_dir: PathBuf,
    exclude: Vec<String>,
}

impl SnapshotCollector {
    pub fn new(root: impl Into<PathBuf>, meta_dir: impl Into<PathBuf>, exclude: Vec<String>) -> Self {
        Self {
            root: root.into(),
            meta_dir: meta_dir.into(),
            exclude,
        }
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.meta_dir.join("snapshots")
    }
}

impl ChangeCollector for SnapshotCollector {
    fn mode(&self) -> TrackingMode {
        TrackingMode::Snapshot
    }

    fn collect(&self) -> Result<ChangeSet> {
        let dir = self.snapshots_dir();
        let previous = load_latest(&dir);
        let current = Snapshot::capture(&self.root, &self.exclude, &[self.meta_dir.clone()]);

        let diff = Snapshot::diff(previous.as_ref(), &current);
        let changes = Snapshot::to_changes(&diff, previous.as_ref(), &current);
        let path = save(&dir, &current)?;

        tracing::debug!(
            files = current.files.len(),
            changes = changes.len(),
            path = %path.display(),
            "Collected snapshot changes"
        );

        Ok(ChangeSet {
            changes,
            snapshot: Some(SnapshotInfo {
                path,
                file_count: current.files.len(),
                total_bytes: current.total_bytes(),
                captured_at: current.timestamp,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snap(entries: &[(&str, &str, u64)]) -> Snapshot {
        Snapshot {
            files: entries
                .iter()
                .map(|(p, h, s)| {
                    (
                        p.to_string(),
                        FileFingerprint {
                            hash: h.to_string(),
                            size: *s,
                        },
                    )
                })
                .collect(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_diff_against_previous_and_none() {
        let s1 = snap(&[("a", "h1", 10)]);
        let s2 = snap(&[("a", "h1", 10), ("b", "h2", 20)]);

        let diff = Snapshot::diff(Some(&s1), &s2);
        assert_eq!(diff.added, vec!["b"]);
        assert!(diff.modified.is_empty() && diff.deleted.is_empty());

        let diff = Snapshot::diff(None, &s2);
        assert_eq!(diff.added, vec!["a", "b"]);
    }

    #[test]
    fn test_to_changes_carries_hashes() {
        let old = snap(&[("keep", "h1", 1), ("edit", "h2", 2), ("drop", "h3", 3)]);
        let new = snap(&[("keep", "h1", 1), ("edit", "h9", 2), ("new", "h4", 4)]);
        let diff = Snapshot::diff(Some(&old), &new);
        let changes = Snapshot::to_changes(&diff, Some(&old), &new);

        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].path, "new");
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].new_hash.as_deref(), Some("h4"));
        assert_eq!(changes[1].kind, ChangeKind::Modified);
        assert_eq!(changes[1].old_hash.as_deref(), Some("h2"));
        assert_eq!(changes[1].new_hash.as_deref(), Some("h9"));
        assert_eq!(changes[2].kind, ChangeKind::Deleted);
        assert_eq!(changes[2].old_hash.as_deref(), Some("h3"));
        assert_eq!(changes[2].new_hash, None);
    }

    #[test]
    fn test_capture_skips_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(root.join("meta/snapshots")).unwrap();
        std::fs::create_dir_all(root.join("vendor")).unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(root.join("meta/k2d.db"), "db").unwrap();
        std::fs::write(root.join("vendor/lib.c"), "int x;").unwrap();
        std::fs::write(root.join(".env"), "A=1").unwrap();

        let snapshot = Snapshot::capture(root, &["vendor".to_string()], &[root.join("meta")]);
        let paths: Vec<_> = snapshot.files.keys().cloned().collect();
        assert_eq!(paths, vec![".env", "src/main.rs"]);
        assert_eq!(snapshot.files["src/main.rs"].size, 12);
        assert_eq!(snapshot.total_bytes(), 15);
    }

    #[test]
    fn test_collector_round() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let meta = root.join("meta");
        std::fs::write(root.join("a.txt"), "one").unwrap();

        let collector = SnapshotCollector::new(root, &meta, Vec::new());
        let first = collector.collect().unwrap();
        assert_eq!(first.changes.len(), 1);
        assert_eq!(first.changes[0].kind, ChangeKind::Added);
        let info = first.snapshot.unwrap();
        assert_eq!(info.file_count, 1);
        assert!(info.path.exists());

        // Ensure the next snapshot sorts after the first
        std::thread::sleep(std::time::Duration::from_millis(5));
        std::fs::write(root.join("a.txt"), "two").unwrap();
        std::fs::write(root.join("b.txt"), "new").unwrap();

        let second = collector.collect().unwrap();
        let mut kinds: Vec<_> = second
            .changes
            .iter()
            .map(|c| (c.path.as_str(), c.kind))
            .collect();
        kinds.sort_by(|a, b| a.0.cmp(b.0));
        assert_eq!(
            kinds,
            vec![("a.txt", ChangeKind::Modified), ("b.txt", ChangeKind::Added)]
        );
    }

    #[test]
    fn test_load_latest_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(load_latest(&dir.path().join("snapshots")).is_none());
    }
}
