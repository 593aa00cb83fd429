//! Historical import of a project's earlier sessions.
//!
//! The assistant keeps one transcript per session, all in the same directory.
//! When hooks are installed into a project that already has history, every
//! sibling transcript is replayed through full-history reconstruction so the
//! store starts complete.

use crate::agent_config::AgentConfigSnapshot;
use crate::db::{Database, StateKey, TurnBundle};
use crate::error::Result;
use crate::inference::SkillCatalog;
use crate::transcript;
use std::path::{Path, PathBuf};

/// Totals of one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillResult {
    /// Sessions that contributed at least one turn
    pub sessions: usize,
    pub turns: usize,
    pub tools: usize,
}

/// Progress notification, sent after each transcript is handled.
#[derive(Debug, Clone, Copy)]
pub struct BackfillProgress<'a> {
    pub done: usize,
    pub total: usize,
    pub path: &'a Path,
    /// Turns imported from this transcript
    pub turns: usize,
}

/// Session id of a transcript: its file stem.
pub fn session_id_of(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// All `*.jsonl` transcripts next to `transcript`, sorted by name.
pub fn session_files(transcript: &Path) -> Vec<PathBuf> {
    let Some(dir) = transcript.parent() else {
        return Vec::new();
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let pattern = format!("{}/*.jsonl", glob::Pattern::escape(&dir.to_string_lossy()));
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = paths
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Imports every stored-but-unknown session next to a transcript.
pub struct Backfill<'a> {
    db: &'a Database,
    project: &'a Path,
    catalog: &'a SkillCatalog,
    /// The live session: its last turn is left to the per-turn path
    current: Option<&'a Path>,
}

impl<'a> Backfill<'a> {
    pub fn new(db: &'a Database, project: &'a Path, catalog: &'a SkillCatalog) -> Self {
        Self {
            db,
            project,
            catalog,
            current: None,
        }
    }

    /// Leave the last turn of `transcript` out of the import.
    pub fn excluding_last_turn_of(mut self, transcript: &'a Path) -> Self {
        self.current = Some(transcript);
        self
    }

    /// Import every session beside `transcript`.
    ///
    /// Turns are numbered globally from `first_turn_number + 1`; afterwards
    /// `current_turn_number` is set to `first_turn_number` plus the turns
    /// imported. Sessions already in the store are skipped. A transcript that
    /// cannot be read is logged and skipped.
    pub fn run<F>(&self, transcript: &Path, first_turn_number: i64, mut progress: F) -> Result<BackfillResult>
    where
        F: FnMut(BackfillProgress<'_>),
    {
        let files = session_files(transcript);
        let total = files.len();
        let mut result = BackfillResult::default();

        tracing::info!(
            dir = %transcript.parent().unwrap_or(Path::new(".")).display(),
            files = total,
            "Starting backfill"
        );

        for (idx, path) in files.iter().enumerate() {
            let exclude_last = self.current.is_some_and(|current| same_file(path, current));
            let offset = first_turn_number + result.turns as i64;

            let (turns, tools) = match self.import_session(path, offset, exclude_last) {
                Ok(counts) => counts,
                Err(crate::Error::Transcript { path, message }) => {
                    tracing::warn!(path = %path.display(), error = %message, "Skipping unreadable transcript");
                    (0, 0)
                }
                Err(e) => return Err(e),
            };

            if turns > 0 {
                result.sessions += 1;
                result.turns += turns;
                result.tools += tools;
            }

            progress(BackfillProgress {
                done: idx + 1,
                total,
                path,
                turns,
            });
        }

        self.db.set_state(
            StateKey::CurrentTurnNumber,
            &(first_turn_number + result.turns as i64).to_string(),
        )?;

        tracing::info!(
            sessions = result.sessions,
            turns = result.turns,
            tools = result.tools,
            "Backfill complete"
        );
        Ok(result)
    }

    /// Import one transcript. Returns (turns, tool calls) imported.
    fn import_session(&self, path: &Path, offset: i64, exclude_last: bool) -> Result<(usize, usize)> {
        let Some(session_id) = session_id_of(path) else {
            return Ok((0, 0));
        };
        if self.db.session_exists(&session_id)? {
            tracing::debug!(session_id = %session_id, "Session already stored");
            return Ok((0, 0));
        }

        let mut turns = transcript::full_history(path)?;
        if turns.is_empty() {
            return Ok((0, 0));
        }
        if exclude_last {
            turns.pop();
        }

        self.db.insert_session(&session_id, self.project, 0)?;
        let config = AgentConfigSnapshot::capture(self.project);
        let mut tools = 0;

        for (i, turn) in turns.iter().enumerate() {
            let turn_id = self.db.save_turn(&TurnBundle {
                session_id: &session_id,
                turn_number: offset + i as i64 + 1,
                turn,
                file_changes: &[],
                config_snapshot: Some(&config),
                config_changes: &[],
            })?;
            tools += turn.tool_calls.len();

            for usage in &turn.skill_usages {
                let intro = self
                    .catalog
                    .infer_introduction(&turn.user_message, &usage.skill_name);
                self.db
                    .record_skill_usage(&usage.skill_name, turn_id, &intro.reason)?;
            }
        }

        self.db
            .set_session_turn_count(&session_id, turns.len() as i64)?;
        tracing::debug!(session_id = %session_id, turns = turns.len(), tools, "Imported session");
        Ok((turns.len(), tools))
    }
}
