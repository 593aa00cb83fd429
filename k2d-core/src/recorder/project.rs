//! Opening a project's store.

use crate::changes::detect_tracking_mode;
use crate::config::Config;
use crate::db::{Database, StateKey};
use crate::error::Result;
use crate::layout;
use crate::types::TrackingMode;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// A project with its meta directory and migrated store.
pub struct ProjectStore {
    pub root: PathBuf,
    pub meta: PathBuf,
    pub db: Database,
    pub mode: TrackingMode,
    /// Set when this open created the store's run state
    pub created: bool,
}

impl ProjectStore {
    /// Bootstrap the meta directory, then open and migrate the store.
    ///
    /// A store without a recorded tracking mode is treated as new: the mode
    /// is decided (configured preference, else detection) and persisted
    /// together with `initialized_at` and `version`.
    pub fn open(config: &Config, root: &Path) -> Result<Self> {
        let meta = config.meta_dir(root);
        if !layout::is_initialized(&meta) {
            tracing::info!(meta = %meta.display(), "Creating meta directory");
        }
        layout::ensure(&meta)?;

        let db = Database::open(&config.database_path(root))?;
        db.migrate()?;

        let (mode, created) = match db.tracking_mode()? {
            Some(mode) => (mode, false),
            None => {
                let mode = config
                    .tracking
                    .mode
                    .forced()
                    .unwrap_or_else(|| detect_tracking_mode(root));
                db.set_state(StateKey::TrackingMode, mode.as_str())?;
                db.set_state(StateKey::InitializedAt, &Utc::now().to_rfc3339())?;
                db.set_state(StateKey::Version, env!("CARGO_PKG_VERSION"))?;
                tracing::info!(root = %root.display(), mode = %mode, "Initialized project store");
                (mode, true)
            }
        };

        Ok(Self {
            root: root.to_path_buf(),
            meta,
            db,
            mode,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackingPreference;
    use tempfile::TempDir;

    fn snapshot_config() -> Config {
        let mut config = Config::default();
        config.tracking.mode = TrackingPreference::Snapshot;
        config
    }

    #[test]
    fn test_first_open_initializes() {
        let dir = TempDir::new().unwrap();
        let config = snapshot_config();

        let store = ProjectStore::open(&config, dir.path()).unwrap();
        assert!(store.created);
        assert_eq!(store.mode, TrackingMode::Snapshot);
        assert!(store.meta.join("snapshots").is_dir());
        assert!(store.meta.join("k2d.db").is_file());
        assert!(store.db.get_state(StateKey::InitializedAt).unwrap().is_some());
        assert_eq!(
            store.db.get_state(StateKey::Version).unwrap().as_deref(),
            Some(env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_mode_is_decided_once() {
        let dir = TempDir::new().unwrap();
        let first = ProjectStore::open(&snapshot_config(), dir.path()).unwrap();
        drop(first);

        let mut config = Config::default();
        config.tracking.mode = TrackingPreference::Git;
        let second = ProjectStore::open(&config, dir.path()).unwrap();
        assert!(!second.created);
        assert_eq!(second.mode, TrackingMode::Snapshot);
    }

    #[test]
    fn test_auto_detects_plain_directory() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::open(&Config::default(), dir.path()).unwrap();
        assert_eq!(store.mode, TrackingMode::Snapshot);
    }
}
