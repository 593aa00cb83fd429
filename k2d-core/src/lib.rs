//! # k2d-core
//!
//! Core library for k2d - turns an AI coding assistant's session logs into
//! a per-project record of what happened in every conversational turn.
//!
//! This library provides:
//! - Turn reconstruction from JSONL transcripts ([`transcript`])
//! - File change detection via git or content-hash snapshots ([`changes`])
//! - Assistant configuration tracking ([`agent_config`])
//! - Phase and skill inference ([`inference`])
//! - SQLite storage ([`db`]) and the per-turn pipeline ([`recorder`])
//! - Configuration management and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use k2d_core::{Config, HookInput, TurnRecorder};
//!
//! let config = Config::load().expect("failed to load config");
//! let input = HookInput::parse(r#"{"session_id":"s","transcript_path":"/tmp/s.jsonl"}"#)
//!     .expect("invalid payload");
//!
//! let output = TurnRecorder::new(&config).run(&input);
//! println!("{}", serde_json::to_string(&output).unwrap());
//! ```

// Re-export commonly used items at the crate root
pub use agent_config::AgentConfigSnapshot;
pub use config::Config;
pub use db::{Database, StateKey};
pub use error::{Error, Result};
pub use recorder::{HookInput, HookOutput, ProjectStore, TurnRecorder};
pub use types::*;

// Public modules
pub mod agent_config;
pub mod changes;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod inference;
pub mod layout;
pub mod logging;
pub mod recorder;
pub mod redact;
pub mod transcript;
pub mod types;
