//! Error types for k2d-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the k2d-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The transcript itself could not be opened or read
    #[error("transcript {}: {message}", path.display())]
    Transcript { path: PathBuf, message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Hook payload could not be understood
    #[error("invalid hook input: {0}")]
    HookInput(String),
}

/// Result type alias for k2d-core
pub type Result<T> = std::result::Result<T, Error>;
