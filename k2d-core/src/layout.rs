//! Per-project meta directory layout.
//!
//! ```text
//! meta/
//! ├── k2d.db
//! ├── snapshots/
//! ├── patterns/{workflows,skill-tactics,tool-combos}/
//! ├── assets/{rules,templates,skill-packs}/
//! ├── reports/
//! └── references/
//! ```

use crate::error::Result;
use std::path::Path;

/// Sub-directories of the meta directory, parents before children.
pub const SUBDIRS: &[&str] = &[
    "snapshots",
    "patterns",
    "patterns/workflows",
    "patterns/skill-tactics",
    "patterns/tool-combos",
    "assets",
    "assets/rules",
    "assets/templates",
    "assets/skill-packs",
    "reports",
    "references",
];

/// Create the meta directory and its sub-directories. Idempotent.
pub fn ensure(meta: &Path) -> Result<()> {
    std::fs::create_dir_all(meta)?;
    for sub in SUBDIRS {
        std::fs::create_dir_all(meta.join(sub))?;
    }
    tracing::debug!(meta = %meta.display(), "Meta directory ready");
    Ok(())
}

/// Whether the meta directory exists.
pub fn is_initialized(meta: &Path) -> bool {
    meta.is_dir()
}
