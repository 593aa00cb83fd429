//! File change detection around a turn.
//!
//! Two interchangeable strategies produce the same [`FileChange`] records:
//! - [`GitCollector`]: parses `git status` and attaches diffs and the HEAD revision
//! - [`SnapshotCollector`]: diffs content-hash snapshots of the project tree
//!
//! The strategy is chosen once per project (see [`detect_tracking_mode`]) and
//! persisted; callers get a boxed [`ChangeCollector`] from [`collector_for`].

pub mod git;
pub mod snapshot;

pub use git::GitCollector;
pub use snapshot::{Snapshot, SnapshotCollector};

use crate::error::Result;
use crate::types::{FileChange, TrackingMode};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Metadata of the snapshot written during a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub file_count: usize,
    pub total_bytes: u64,
    pub captured_at: DateTime<Utc>,
}

/// Output of one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub changes: Vec<FileChange>,
    /// Set in snapshot mode
    pub snapshot: Option<SnapshotInfo>,
}

/// A file change detection strategy.
pub trait ChangeCollector {
    fn mode(&self) -> TrackingMode;

    /// Changes observed since the previous collection.
    fn collect(&self) -> Result<ChangeSet>;
}

/// `git` when a git binary runs and `project` is a repository, otherwise `snapshot`.
pub fn detect_tracking_mode(project: &Path) -> TrackingMode {
    if git::is_available() && git::is_repository(project) {
        TrackingMode::Git
    } else {
        TrackingMode::Snapshot
    }
}

/// Build the collector for a project's persisted tracking mode.
pub fn collector_for(
    mode: TrackingMode,
    project: &Path,
    meta_dir: &Path,
    exclude: &[String],
) -> Box<dyn ChangeCollector> {
    match mode {
        TrackingMode::Git => Box::new(GitCollector::new(project)),
        TrackingMode::Snapshot => Box::new(SnapshotCollector::new(
            project,
            meta_dir,
            exclude.to_vec(),
        )),
    }
}
