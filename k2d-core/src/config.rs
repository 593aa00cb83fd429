//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/k2d/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/k2d/` (~/.config/k2d/)
//! - State/Logs: `$XDG_STATE_HOME/k2d/` (~/.local/state/k2d/)
//!
//! Captured data lives inside each project, under `<project>/<storage.meta_dir>/`.

use crate::error::{Error, Result};
use crate::types::TrackingMode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where captured data is stored inside a project
    #[serde(default)]
    pub storage: StorageConfig,

    /// File-change tracking configuration
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Extra signals for the inference components
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Per-project storage configuration
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Name of the state directory created at the project root
    #[serde(default = "default_meta_dir")]
    pub meta_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            meta_dir: default_meta_dir(),
        }
    }
}

fn default_meta_dir() -> String {
    "meta".to_string()
}

/// Requested tracking mode, applied when a project store is first created.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingPreference {
    /// Use git when the project is a repository, snapshots otherwise
    #[default]
    Auto,
    Git,
    Snapshot,
}

impl TrackingPreference {
    /// The forced mode, or `None` when detection should decide.
    pub fn forced(&self) -> Option<TrackingMode> {
        match self {
            TrackingPreference::Auto => None,
            TrackingPreference::Git => Some(TrackingMode::Git),
            TrackingPreference::Snapshot => Some(TrackingMode::Snapshot),
        }
    }
}

/// File-change tracking configuration
#[derive(Debug, Deserialize, Default)]
pub struct TrackingConfig {
    /// Tracking mode preference
    #[serde(default)]
    pub mode: TrackingPreference,

    /// Additional directory names skipped when taking snapshots
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Inference configuration
#[derive(Debug, Deserialize, Default)]
pub struct InferenceConfig {
    /// Extra keywords per skill name, registered on top of the built-in catalog
    #[serde(default)]
    pub skill_keywords: BTreeMap<String, Vec<String>>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        if config.storage.meta_dir.trim().is_empty() {
            return Err(Error::Config("storage.meta_dir must not be empty".to_string()));
        }

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/k2d/config.toml` (~/.config/k2d/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("k2d").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/k2d/` (~/.local/state/k2d/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("k2d")
    }

    /// Returns the log file prefix path; the appender adds a date suffix.
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("k2d.log")
    }

    /// The per-project state directory (`<project>/meta` by default).
    pub fn meta_dir(&self, project: &Path) -> PathBuf {
        project.join(&self.storage.meta_dir)
    }

    /// The per-project database file.
    pub fn database_path(&self, project: &Path) -> PathBuf {
        self.meta_dir(project).join("k2d.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.meta_dir, "meta");
        assert_eq!(config.tracking.mode, TrackingPreference::Auto);
        assert!(config.tracking.exclude.is_empty());
        assert!(config.inference.skill_keywords.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[logging]
level = "debug"
max_files = 2

[storage]
meta_dir = ".k2d"

[tracking]
mode = "snapshot"
exclude = ["vendor", "coverage"]

[inference.skill_keywords]
dev-coding = ["scaffold"]
my-skill = ["alpha", "beta"]
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 2);
        assert_eq!(config.storage.meta_dir, ".k2d");
        assert_eq!(config.tracking.mode.forced(), Some(TrackingMode::Snapshot));
        assert_eq!(config.tracking.exclude, vec!["vendor", "coverage"]);
        assert_eq!(
            config.inference.skill_keywords.get("my-skill"),
            Some(&vec!["alpha".to_string(), "beta".to_string()])
        );
    }

    #[test]
    fn test_project_paths() {
        let config = Config::default();
        let project = Path::new("/work/app");
        assert_eq!(config.meta_dir(project), PathBuf::from("/work/app/meta"));
        assert_eq!(
            config.database_path(project),
            PathBuf::from("/work/app/meta/k2d.db")
        );
    }

    #[test]
    fn test_auto_preference_defers_to_detection() {
        assert_eq!(TrackingPreference::Auto.forced(), None);
        assert_eq!(TrackingPreference::Git.forced(), Some(TrackingMode::Git));
    }

    #[test]
    fn test_empty_meta_dir_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nmeta_dir = \"  \"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
