//! Database layer for k2d
//!
//! One SQLite store per project, under the project's meta directory:
//! - Schema migrations tracked with `PRAGMA user_version`
//! - Typed repository operations, one record struct per table
//! - A small key/value table for run-to-run state ([`StateKey`])

pub mod repo;
pub mod schema;

pub use repo::{
    Database, PhaseRecord, SessionRecord, SkillLifecycle, SkillUsageRecord, StateKey, TurnBundle,
    TurnRecord,
};
