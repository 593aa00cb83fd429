//! Per-turn recording: the work done each time the assistant finishes a turn.
//!
//! ## Flow
//!
//! ```text
//! HookInput ──► ProjectStore::open ──► (backfill when empty)
//!                                          │
//!     latest turn ◄── transcript            ▼
//!     file changes ◄── ChangeCollector ──► save_turn ──► skill lifecycle
//!     config diff ◄── AgentConfigSnapshot              └─► phase transition
//! ```
//!
//! [`TurnRecorder::run`] never fails: any error becomes a skipped
//! [`HookOutput`] carrying the error text.

pub mod backfill;
pub mod project;

pub use backfill::{session_files, session_id_of, Backfill, BackfillProgress, BackfillResult};
pub use project::ProjectStore;

use crate::agent_config::{self, AgentConfigSnapshot};
use crate::changes::collector_for;
use crate::config::Config;
use crate::db::{StateKey, TurnBundle};
use crate::error::{Error, Result};
use crate::inference::{catalog_from_config, PhaseInputs, PhaseTable, SkillCatalog};
use crate::transcript;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Reason reported when the reentrancy guard is set.
pub const STOP_HOOK_ACTIVE: &str = "stop_hook_active";

/// Payload the assistant sends on stdin when a turn ends.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    pub session_id: String,
    pub transcript_path: PathBuf,
    /// Set when the assistant is already continuing because of a stop hook
    #[serde(default)]
    pub stop_hook_active: bool,
    /// Project directory; the process working directory when absent
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

impl HookInput {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::HookInput(e.to_string()))
    }

    /// Session id: the transcript's file stem, else the payload's id.
    pub fn session_id(&self) -> String {
        session_id_of(&self.transcript_path).unwrap_or_else(|| self.session_id.clone())
    }
}

/// Summary printed on stdout after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_sessions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_tools: Option<usize>,
}

impl HookOutput {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: true,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// A recorded turn; backfill totals are reported only when turns were imported.
    pub fn recorded(turn_id: i64, backfill: BackfillResult) -> Self {
        let mut output = Self {
            turn_id: Some(turn_id),
            ..Default::default()
        };
        if backfill.turns > 0 {
            output.imported = Some(backfill.turns);
            output.imported_sessions = Some(backfill.sessions);
            output.imported_tools = Some(backfill.tools);
        }
        output
    }
}

/// Records one turn per invocation.
pub struct TurnRecorder<'c> {
    config: &'c Config,
    catalog: SkillCatalog,
    phases: PhaseTable,
}

impl<'c> TurnRecorder<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            catalog: catalog_from_config(&config.inference),
            phases: PhaseTable::default(),
        }
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    /// Record the turn described by `input`, reporting failures as a skip.
    pub fn run(&self, input: &HookInput) -> HookOutput {
        match self.record(input) {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(error = %e, transcript = %input.transcript_path.display(), "Recording failed");
                HookOutput::skipped(e.to_string())
            }
        }
    }

    /// Record the turn described by `input`.
    pub fn record(&self, input: &HookInput) -> Result<HookOutput> {
        if input.stop_hook_active {
            tracing::debug!("Stop hook already active, skipping");
            return Ok(HookOutput::skipped(STOP_HOOK_ACTIVE));
        }

        let root = match &input.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir()?,
        };
        let store = ProjectStore::open(self.config, &root)?;
        let db = &store.db;

        let backfill = if store.created || db.count_turns()? == 0 {
            Backfill::new(db, &root, &self.catalog)
                .excluding_last_turn_of(&input.transcript_path)
                .run(&input.transcript_path, 0, |_| {})?
        } else {
            BackfillResult::default()
        };

        let session_id = input.session_id();
        self.ensure_session(&store, &session_id)?;

        let turn_number = db.current_turn_number()? + 1;
        db.set_state(StateKey::CurrentTurnNumber, &turn_number.to_string())?;

        let turn = transcript::latest_turn(&input.transcript_path)?;

        let collector = collector_for(store.mode, &root, &store.meta, &self.config.tracking.exclude);
        let change_set = collector.collect()?;

        let config_now = AgentConfigSnapshot::capture(&root);
        let config_before = db.last_config_snapshot()?;
        let config_changes = agent_config::detect_changes(config_before.as_ref(), &config_now);
        db.set_state(StateKey::LastConfigSnapshot, &serde_json::to_string(&config_now)?)?;

        let turn_id = db.save_turn(&TurnBundle {
            session_id: &session_id,
            turn_number,
            turn: &turn,
            file_changes: &change_set.changes,
            config_snapshot: Some(&config_now),
            config_changes: &config_changes,
        })?;

        if let Some(info) = &change_set.snapshot {
            db.insert_snapshot_meta(
                turn_id,
                &info.path,
                info.file_count,
                info.total_bytes,
                info.captured_at,
            )?;
        }

        for usage in &turn.skill_usages {
            let intro = self
                .catalog
                .infer_introduction(&turn.user_message, &usage.skill_name);
            db.record_skill_usage(&usage.skill_name, turn_id, &intro.reason)?;
        }

        self.track_phase(&store, turn_id, &turn, &change_set.changes)?;

        let session_turns = db.count_session_turns(&session_id)?;
        db.set_session_turn_count(&session_id, session_turns)?;

        tracing::info!(
            turn_id,
            turn_number,
            session_id = %session_id,
            mode = %store.mode,
            tool_calls = turn.tool_calls.len(),
            file_changes = change_set.changes.len(),
            config_changes = config_changes.len(),
            imported = backfill.turns,
            "Recorded turn"
        );

        Ok(HookOutput::recorded(turn_id, backfill))
    }

    /// Make `session_id` the current session, creating its row if needed.
    fn ensure_session(&self, store: &ProjectStore, session_id: &str) -> Result<()> {
        let db = &store.db;
        if !db.session_exists(session_id)? {
            tracing::info!(session_id, "Starting session");
            db.insert_session(session_id, &store.root, 0)?;
        }
        if db.get_state(StateKey::CurrentSessionId)?.as_deref() != Some(session_id) {
            db.set_state(StateKey::CurrentSessionId, session_id)?;
        }
        Ok(())
    }

    /// Open a new phase when the turn points somewhere other than the latest one.
    fn track_phase(
        &self,
        store: &ProjectStore,
        turn_id: i64,
        turn: &crate::types::Turn,
        changes: &[crate::types::FileChange],
    ) -> Result<()> {
        let skills: Vec<String> = turn.skill_usages.iter().map(|s| s.skill_name.clone()).collect();
        let paths: Vec<String> = changes.iter().map(|c| c.path.clone()).collect();
        let phase = self.phases.infer(&PhaseInputs {
            skills: &skills,
            paths: &paths,
            context: Some(&turn.user_message),
        });

        let latest = store.db.list_phases()?.last().map(|p| p.phase);
        if latest != Some(phase) {
            let tools: Vec<String> = turn.tool_calls.iter().map(|t| t.name.clone()).collect();
            tracing::info!(from = ?latest, to = %phase, turn_id, "Phase transition");
            store
                .db
                .record_phase_transition(phase, turn_id, &skills, &tools)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hook_input() {
        let input = HookInput::parse(
            r#"{"session_id":"abc","transcript_path":"/t/s1.jsonl","stop_hook_active":true,"extra":1}"#,
        )
        .unwrap();
        assert!(input.stop_hook_active);
        assert_eq!(input.session_id(), "s1");
        assert!(input.cwd.is_none());

        let minimal = HookInput::parse(r#"{"session_id":"abc","transcript_path":"/t/x.jsonl"}"#).unwrap();
        assert!(!minimal.stop_hook_active);

        assert!(matches!(HookInput::parse("{}"), Err(Error::HookInput(_))));
        assert!(matches!(HookInput::parse("nope"), Err(Error::HookInput(_))));
    }

    #[test]
    fn test_output_shapes() {
        let skipped = serde_json::to_value(HookOutput::skipped(STOP_HOOK_ACTIVE)).unwrap();
        assert_eq!(
            skipped,
            serde_json::json!({"skipped": true, "reason": "stop_hook_active"})
        );

        let plain = serde_json::to_value(HookOutput::recorded(4, BackfillResult::default())).unwrap();
        assert_eq!(plain, serde_json::json!({"skipped": false, "turnId": 4}));

        let imported = serde_json::to_value(HookOutput::recorded(
            9,
            BackfillResult {
                sessions: 2,
                turns: 8,
                tools: 30,
            },
        ))
        .unwrap();
        assert_eq!(
            imported,
            serde_json::json!({
                "skipped": false,
                "turnId": 9,
                "imported": 8,
                "importedSessions": 2,
                "importedTools": 30
            })
        );
    }

    #[test]
    fn test_guard_skips_without_touching_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::default();
        let input = HookInput {
            session_id: "s".to_string(),
            transcript_path: dir.path().join("s.jsonl"),
            stop_hook_active: true,
            cwd: Some(dir.path().to_path_buf()),
        };
        let output = TurnRecorder::new(&config).run(&input);
        assert_eq!(output, HookOutput::skipped(STOP_HOOK_ACTIVE));
        assert!(!dir.path().join("meta").exists());
    }

    #[test]
    fn test_missing_transcript_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.tracking.mode = crate::config::TrackingPreference::Snapshot;
        let input = HookInput {
            session_id: "s".to_string(),
            transcript_path: dir.path().join("missing.jsonl"),
            stop_hook_active: false,
            cwd: Some(dir.path().to_path_buf()),
        };
        let output = TurnRecorder::new(&config).run(&input);
        assert!(output.skipped);
        assert!(output.reason.unwrap().contains("missing.jsonl"));
    }
}
