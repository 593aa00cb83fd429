//! Git-backed file change detection.
//!
//! Every git invocation is best effort: a missing binary, a non-repository or
//! a failing command yields nothing rather than an error.

use super::{ChangeCollector, ChangeSet};
use crate::error::Result;
use crate::types::{ChangeKind, FileChange, TrackingMode};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run `git -C <root> <args>` and return stdout when it succeeds.
fn git(root: Option<&Path>, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new("git");
    if let Some(root) = root {
        cmd.arg("-C").arg(root);
    }
    let output = cmd.args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether a `git` binary can be executed.
pub fn is_available() -> bool {
    git(None, &["--version"]).is_some()
}

/// Whether `root` is inside a git work tree.
pub fn is_repository(root: &Path) -> bool {
    git(Some(root), &["rev-parse", "--git-dir"]).is_some()
}

/// Parse `git status --porcelain` output into `(path, kind)` pairs.
///
/// Each line is `XY <path>`; a rename `old -> new` keeps the new path. Codes
/// are checked in priority order: `?`/`A` add, then `D` delete, then
/// `M`/`R`/`C` modify. Other codes are ignored.
pub fn parse_status(output: &str) -> Vec<(String, ChangeKind)> {
    output
        .trim_end()
        .lines()
        .filter_map(|line| {
            let status = line.get(..2)?;
            let mut path = line.get(3..)?.trim();
            if let Some((_, renamed)) = path.split_once(" -> ") {
                path = renamed;
            }
            if path.is_empty() {
                return None;
            }

            let has = |c: char| status.contains(c);
            let kind = if has('?') || has('A') {
                ChangeKind::Added
            } else if has('D') {
                ChangeKind::Deleted
            } else if has('M') || has('R') || has('C') {
                ChangeKind::Modified
            } else {
                return None;
            };
            Some((path.to_string(), kind))
        })
        .collect()
}

/// Collects changes from the working tree status.
pub struct GitCollector {
    root: PathBuf,
}

impl GitCollector {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn diff_for(&self, path: &str, kind: ChangeKind) -> Option<String> {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        let diff = git(Some(&self.root), &["diff", "HEAD", "--", path]).and_then(non_empty);
        if diff.is_none() && kind == ChangeKind::Added {
            return git(Some(&self.root), &["diff", "--cached", "--", path]).and_then(non_empty);
        }
        diff
    }
}

impl ChangeCollector for GitCollector {
    fn mode(&self) -> TrackingMode {
        TrackingMode::Git
    }

    fn collect(&self) -> Result<ChangeSet> {
        let Some(status) = git(Some(&self.root), &["status", "--porcelain"]) else {
            tracing::warn!(root = %self.root.display(), "git status failed, no file changes recorded");
            return Ok(ChangeSet::default());
        };

        let commit = git(Some(&self.root), &["rev-parse", "HEAD"])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let changes: Vec<FileChange> = parse_status(&status)
            .into_iter()
            .map(|(path, kind)| {
                let diff = match kind {
                    ChangeKind::Deleted => None,
                    _ => self.diff_for(&path, kind),
                };
                FileChange {
                    diff,
                    commit: commit.clone(),
                    ..FileChange::new(path, kind)
                }
            })
            .collect();

        tracing::debug!(count = changes.len(), "Collected git changes");
        Ok(ChangeSet {
            changes,
            snapshot: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_basic() {
        let parsed = parse_status("?? a.ts\n M b.ts\n D c.ts");
        assert_eq!(
            parsed,
            vec![
                ("a.ts".to_string(), ChangeKind::Added),
                ("b.ts".to_string(), ChangeKind::Modified),
                ("c.ts".to_string(), ChangeKind::Deleted),
            ]
        );
    }

    #[test]
    fn test_parse_status_rename() {
        assert_eq!(
            parse_status("R  old.ts -> new.ts\n"),
            vec![("new.ts".to_string(), ChangeKind::Modified)]
        );
    }

    #[test]
    fn test_parse_status_priority_and_noise() {
        let parsed = parse_status("AM staged.rs\nMD gone.rs\nC  copy.rs\n!! ignored\nx\n");
        assert_eq!(
            parsed,
            vec![
                ("staged.rs".to_string(), ChangeKind::Added),
                ("gone.rs".to_string(), ChangeKind::Deleted),
                ("copy.rs".to_string(), ChangeKind::Modified),
            ]
        );
    }

    #[test]
    fn test_collect_outside_repository_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let collector = GitCollector::new(dir.path());
        let set = collector.collect().unwrap();
        assert!(set.changes.is_empty());
        assert!(set.snapshot.is_none());
        assert!(!is_repository(dir.path()));
    }
}
