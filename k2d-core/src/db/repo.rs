//! Database repository layer
//!
//! Typed insert and query operations for every table. Business code never
//! sees a `rusqlite::Row`; rows are mapped into the record structs below.

use crate::agent_config::AgentConfigSnapshot;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ============================================
// Records
// ============================================

/// Keys of the run-to-run state kept in the `config` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    CurrentSessionId,
    /// Global turn counter across all sessions
    CurrentTurnNumber,
    /// JSON of the last [`AgentConfigSnapshot`]
    LastConfigSnapshot,
    TrackingMode,
    InitializedAt,
    Version,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::CurrentSessionId => "current_session_id",
            StateKey::CurrentTurnNumber => "current_turn_number",
            StateKey::LastConfigSnapshot => "last_config_snapshot",
            StateKey::TrackingMode => "tracking_mode",
            StateKey::InitializedAt => "initialized_at",
            StateKey::Version => "version",
        }
    }
}

/// A stored session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub project_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub turn_count: i64,
}

/// A stored turn, without its sub-records.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRecord {
    pub id: i64,
    pub session_id: String,
    /// Global across sessions, starting at 1
    pub turn_number: i64,
    pub user_message: Option<String>,
    pub assistant_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored skill usage.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillUsageRecord {
    pub turn_id: i64,
    pub skill_name: String,
    pub trigger: Option<SkillTrigger>,
    pub outcome: Option<SkillOutcome>,
    pub used_at: DateTime<Utc>,
}

/// Per-skill aggregate, one row per skill name.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillLifecycle {
    pub skill_name: String,
    pub introduced_at: Option<DateTime<Utc>>,
    pub introduced_turn_id: Option<i64>,
    pub introduction_reason: Option<String>,
    pub total_usages: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// A project phase. At most one is open (`ended_at` unset).
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseRecord {
    pub id: i64,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub started_turn_id: Option<i64>,
    pub ended_turn_id: Option<i64>,
    pub dominant_skills: Vec<String>,
    pub dominant_tools: Vec<String>,
}

/// Everything persisted for one turn by [`Database::save_turn`].
#[derive(Debug, Clone, Copy)]
pub struct TurnBundle<'a> {
    pub session_id: &'a str,
    pub turn_number: i64,
    pub turn: &'a Turn,
    pub file_changes: &'a [FileChange],
    pub config_snapshot: Option<&'a AgentConfigSnapshot>,
    pub config_changes: &'a [ConfigChange],
}

// ============================================
// Database
// ============================================

/// Database handle with connection
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Run state
    // ============================================

    pub fn get_state(&self, key: StateKey) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT value FROM config WHERE key = ?",
            [key.as_str()],
            |r| r.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn set_state(&self, key: StateKey, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![key.as_str(), value],
        )?;
        Ok(())
    }

    /// Persisted tracking mode, if one was recorded and is recognized.
    pub fn tracking_mode(&self) -> Result<Option<TrackingMode>> {
        Ok(self
            .get_state(StateKey::TrackingMode)?
            .and_then(|s| s.parse().ok()))
    }

    /// Global turn counter (0 when unset or unparseable).
    pub fn current_turn_number(&self) -> Result<i64> {
        Ok(self
            .get_state(StateKey::CurrentTurnNumber)?
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0))
    }

    /// Last stored configuration capture. Unreadable JSON counts as none.
    pub fn last_config_snapshot(&self) -> Result<Option<AgentConfigSnapshot>> {
        let Some(json) = self.get_state(StateKey::LastConfigSnapshot)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable last config snapshot");
                Ok(None)
            }
        }
    }

    // ============================================
    // Session operations
    // ============================================

    /// Create a session with a generated id and return the id.
    pub fn create_session(&self, project_path: &Path) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.insert_session(&id, project_path, 0)?;
        Ok(id)
    }

    /// Insert a session with a known id (the transcript's).
    pub fn insert_session(&self, id: &str, project_path: &Path, turn_count: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO sessions (id, project_path, started_at, turn_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?3)
            "#,
            params![id, project_path.to_string_lossy().to_string(), now, turn_count],
        )?;
        Ok(())
    }

    pub fn session_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE id = ?",
            [id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM sessions WHERE id = ?", [id], |row| {
            Self::row_to_session(row)
        })
        .optional()
        .map_err(Error::from)
    }

    /// Sessions, most recently started first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM sessions ORDER BY started_at DESC, rowid DESC LIMIT ?")?;
        let rows = stmt.query_map([limit as i64], Self::row_to_session)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    pub fn end_session(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET ended_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn set_session_turn_count(&self, id: &str, turn_count: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET turn_count = ?1 WHERE id = ?2",
            params![turn_count, id],
        )?;
        Ok(())
    }

    /// Number of stored turns belonging to a session.
    pub fn count_session_turns(&self, id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM turns WHERE session_id = ?",
            [id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<SessionRecord> {
        let path: String = row.get("project_path")?;
        let started_at: String = row.get("started_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;

        Ok(SessionRecord {
            id: row.get("id")?,
            project_path: PathBuf::from(path),
            started_at: parse_time(&started_at),
            ended_at: ended_at.as_deref().map(parse_time),
            turn_count: row.get("turn_count")?,
        })
    }

    // ============================================
    // Turn operations
    // ============================================

    /// Insert a turn row and bump its session's turn count. Returns the turn id.
    pub fn insert_turn(
        &self,
        session_id: &str,
        turn_number: i64,
        user_message: &str,
        assistant_response: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO turns (session_id, turn_number, user_message, assistant_response, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                session_id,
                turn_number,
                user_message,
                assistant_response,
                Utc::now().to_rfc3339()
            ],
        )?;
        let turn_id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE sessions SET turn_count = turn_count + 1 WHERE id = ?",
            [session_id],
        )?;
        Ok(turn_id)
    }

    /// Turns of a session in turn-number order.
    pub fn list_turns(&self, session_id: &str) -> Result<Vec<TurnRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM turns WHERE session_id = ? ORDER BY turn_number, id")?;
        let rows = stmt.query_map([session_id], |row| {
            let created_at: String = row.get("created_at")?;
            Ok(TurnRecord {
                id: row.get("id")?,
                session_id: row.get("session_id")?,
                turn_number: row.get("turn_number")?,
                user_message: row.get("user_message")?,
                assistant_response: row.get("assistant_response")?,
                created_at: parse_time(&created_at),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// Number of stored turns across all sessions.
    pub fn count_turns(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM turns", [], |r| r.get(0))?;
        Ok(count)
    }

    // ============================================
    // Turn sub-records
    // ============================================

    pub fn insert_tool_calls(&self, turn_id: i64, calls: &[ToolCall]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO tool_calls (
                turn_id, tool_name, tool_type, parameters, result_status,
                result_summary, execution_time_ms, called_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for call in calls {
            stmt.execute(params![
                turn_id,
                call.name,
                call.category.as_str(),
                call.parameters.to_string(),
                call.outcome.as_str(),
                call.result_summary,
                call.duration_ms,
                now,
            ])?;
        }
        Ok(())
    }

    /// Call count per tool name, most used first.
    pub fn tool_stats(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT tool_name, COUNT(*) AS count
            FROM tool_calls
            GROUP BY tool_name
            ORDER BY count DESC, tool_name
            "#,
        )?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    pub fn insert_file_changes(&self, turn_id: i64, changes: &[FileChange]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO file_changes (
                turn_id, file_path, change_type, diff_content, commit_hash,
                old_hash, new_hash, changed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for change in changes {
            stmt.execute(params![
                turn_id,
                change.path,
                change.kind.as_str(),
                change.diff,
                change.commit,
                change.old_hash,
                change.new_hash,
                now,
            ])?;
        }
        Ok(())
    }

    pub fn file_changes_for_turn(&self, turn_id: i64) -> Result<Vec<FileChange>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT file_path, change_type, diff_content, commit_hash, old_hash, new_hash
            FROM file_changes WHERE turn_id = ? ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([turn_id], |row| {
            let kind: String = row.get("change_type")?;
            Ok(FileChange {
                path: row.get("file_path")?,
                kind: kind.parse().unwrap_or(ChangeKind::Modified),
                diff: row.get("diff_content")?,
                commit: row.get("commit_hash")?,
                old_hash: row.get("old_hash")?,
                new_hash: row.get("new_hash")?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    pub fn insert_skill_usages(&self, turn_id: i64, usages: &[SkillUsage]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO skill_usages (turn_id, skill_name, trigger_type, context, outcome, used_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for usage in usages {
            stmt.execute(params![
                turn_id,
                usage.skill_name,
                usage.trigger.as_str(),
                usage.context,
                usage.outcome.map(|o| o.as_str()),
                now,
            ])?;
        }
        Ok(())
    }

    /// Most recent skill usages first.
    pub fn recent_skill_usages(&self, limit: usize) -> Result<Vec<SkillUsageRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT turn_id, skill_name, trigger_type, outcome, used_at
            FROM skill_usages
            ORDER BY used_at DESC, id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], |row| {
            let trigger: Option<String> = row.get("trigger_type")?;
            let outcome: Option<String> = row.get("outcome")?;
            let used_at: String = row.get("used_at")?;
            Ok(SkillUsageRecord {
                turn_id: row.get("turn_id")?,
                skill_name: row.get("skill_name")?,
                trigger: trigger.and_then(|s| s.parse().ok()),
                outcome: outcome.and_then(|s| s.parse().ok()),
                used_at: parse_time(&used_at),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    pub fn insert_mcp_calls(&self, turn_id: i64, calls: &[McpCall]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO mcp_calls (turn_id, server_name, tool_name, request, response, called_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for call in calls {
            stmt.execute(params![
                turn_id,
                call.server_name,
                call.tool_name,
                call.request.to_string(),
                call.response.as_ref().map(|r| r.to_string()),
                now,
            ])?;
        }
        Ok(())
    }

    // ============================================
    // Configuration tracking
    // ============================================

    pub fn insert_config_snapshot(&self, turn_id: i64, snapshot: &AgentConfigSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO config_snapshots (
                turn_id, settings_json, settings_local_json, claude_md, mcp_json, lsp_json,
                agents_list, skills_list, plugins_list, rules_list, commands_list, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                turn_id,
                snapshot.settings_json,
                snapshot.settings_local_json,
                snapshot.claude_md,
                snapshot.mcp_json,
                snapshot.lsp_json,
                serde_json::to_string(&snapshot.agents)?,
                serde_json::to_string(&snapshot.skills)?,
                serde_json::to_string(&snapshot.plugins)?,
                serde_json::to_string(&snapshot.rules)?,
                serde_json::to_string(&snapshot.commands)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_config_changes(&self, turn_id: i64, changes: &[ConfigChange]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare_cached(
            r#"
            INSERT INTO config_changes (
                turn_id, config_type, item_name, change_type, before_value,
                after_value, diff_summary, changed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for change in changes {
            stmt.execute(params![
                turn_id,
                change.category.as_str(),
                change.item,
                change.kind.as_str(),
                change.before,
                change.after,
                change.summary,
                now,
            ])?;
        }
        Ok(())
    }

    pub fn config_changes_for_turn(&self, turn_id: i64) -> Result<Vec<ConfigChange>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT config_type, item_name, change_type, before_value, after_value, diff_summary
            FROM config_changes WHERE turn_id = ? ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([turn_id], |row| {
            let category: String = row.get("config_type")?;
            let kind: String = row.get("change_type")?;
            let summary: Option<String> = row.get("diff_summary")?;
            Ok(ConfigChange {
                category: category.parse().unwrap_or(ConfigCategory::Settings),
                item: row.get("item_name")?,
                kind: kind.parse().unwrap_or(ChangeKind::Modified),
                before: row.get("before_value")?,
                after: row.get("after_value")?,
                summary: summary.unwrap_or_default(),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    // ============================================
    // Skill lifecycle
    // ============================================

    /// Count one use of `skill_name`. The first use creates the row with the
    /// introducing turn and reason; later uses only bump the count.
    pub fn record_skill_usage(&self, skill_name: &str, turn_id: i64, reason: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO skill_lifecycle (
                skill_name, introduced_at, introduced_turn_id, introduction_reason,
                total_usages, last_used_at
            ) VALUES (?1, ?2, ?3, ?4, 1, ?2)
            ON CONFLICT(skill_name) DO UPDATE SET
                total_usages = total_usages + 1,
                last_used_at = excluded.last_used_at
            "#,
            params![skill_name, now, turn_id, reason],
        )?;
        Ok(())
    }

    pub fn get_skill_lifecycle(&self, skill_name: &str) -> Result<Option<SkillLifecycle>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM skill_lifecycle WHERE skill_name = ?",
            [skill_name],
            Self::row_to_lifecycle,
        )
        .optional()
        .map_err(Error::from)
    }

    /// All skills, most used first.
    pub fn list_skill_lifecycles(&self) -> Result<Vec<SkillLifecycle>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM skill_lifecycle ORDER BY total_usages DESC, skill_name")?;
        let rows = stmt.query_map([], Self::row_to_lifecycle)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    fn row_to_lifecycle(row: &Row) -> rusqlite::Result<SkillLifecycle> {
        let introduced_at: Option<String> = row.get("introduced_at")?;
        let last_used_at: Option<String> = row.get("last_used_at")?;
        Ok(SkillLifecycle {
            skill_name: row.get("skill_name")?,
            introduced_at: introduced_at.as_deref().map(parse_time),
            introduced_turn_id: row.get("introduced_turn_id")?,
            introduction_reason: row.get("introduction_reason")?,
            total_usages: row.get("total_usages")?,
            last_used_at: last_used_at.as_deref().map(parse_time),
            is_active: row.get("is_active")?,
        })
    }

    // ============================================
    // Project phases
    // ============================================

    /// Close the open phase (if any) at `turn_id` and open `phase` there.
    pub fn record_phase_transition(
        &self,
        phase: Phase,
        turn_id: i64,
        dominant_skills: &[String],
        dominant_tools: &[String],
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE project_phases SET ended_at = ?1, ended_turn_id = ?2 WHERE ended_at IS NULL",
            params![now, turn_id],
        )?;
        conn.execute(
            r#"
            INSERT INTO project_phases (
                phase_name, started_at, started_turn_id, dominant_skills, dominant_tools
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                phase.as_str(),
                now,
                turn_id,
                serde_json::to_string(dominant_skills)?,
                serde_json::to_string(dominant_tools)?,
            ],
        )?;
        Ok(())
    }

    /// Phases in the order they started.
    pub fn list_phases(&self) -> Result<Vec<PhaseRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM project_phases ORDER BY started_at, id")?;
        let rows = stmt.query_map([], Self::row_to_phase)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::from)
    }

    /// The open phase, if any.
    pub fn current_phase(&self) -> Result<Option<PhaseRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM project_phases WHERE ended_at IS NULL ORDER BY id DESC LIMIT 1",
            [],
            Self::row_to_phase,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_phase(row: &Row) -> rusqlite::Result<PhaseRecord> {
        let phase: String = row.get("phase_name")?;
        let started_at: String = row.get("started_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;
        let skills: Option<String> = row.get("dominant_skills")?;
        let tools: Option<String> = row.get("dominant_tools")?;

        Ok(PhaseRecord {
            id: row.get("id")?,
            phase: phase.parse().unwrap_or(Phase::Development),
            started_at: parse_time(&started_at),
            ended_at: ended_at.as_deref().map(parse_time),
            started_turn_id: row.get("started_turn_id")?,
            ended_turn_id: row.get("ended_turn_id")?,
            dominant_skills: parse_names(skills.as_deref()),
            dominant_tools: parse_names(tools.as_deref()),
        })
    }

    // ============================================
    // Snapshot metadata
    // ============================================

    pub fn insert_snapshot_meta(
        &self,
        turn_id: i64,
        path: &Path,
        file_count: usize,
        total_bytes: u64,
        captured_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO snapshots (turn_id, file_path, file_count, total_bytes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                turn_id,
                path.to_string_lossy().to_string(),
                file_count as i64,
                total_bytes as i64,
                captured_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Whole turns
    // ============================================

    /// Persist a turn row and all of its sub-records. Returns the turn id.
    ///
    /// Statements run one after another; a failure part way leaves the rows
    /// already written in place.
    pub fn save_turn(&self, bundle: &TurnBundle<'_>) -> Result<i64> {
        let turn = bundle.turn;
        let turn_id = self.insert_turn(
            bundle.session_id,
            bundle.turn_number,
            &turn.user_message,
            &turn.assistant_response,
        )?;

        if !turn.tool_calls.is_empty() {
            self.insert_tool_calls(turn_id, &turn.tool_calls)?;
        }
        if !turn.skill_usages.is_empty() {
            self.insert_skill_usages(turn_id, &turn.skill_usages)?;
        }
        if !turn.mcp_calls.is_empty() {
            self.insert_mcp_calls(turn_id, &turn.mcp_calls)?;
        }
        if !bundle.file_changes.is_empty() {
            self.insert_file_changes(turn_id, bundle.file_changes)?;
        }
        if let Some(snapshot) = bundle.config_snapshot {
            self.insert_config_snapshot(turn_id, snapshot)?;
        }
        if !bundle.config_changes.is_empty() {
            self.insert_config_changes(turn_id, bundle.config_changes)?;
        }

        tracing::debug!(
            turn_id,
            turn_number = bundle.turn_number,
            session_id = bundle.session_id,
            tools = turn.tool_calls.len(),
            files = bundle.file_changes.len(),
            "Saved turn"
        );
        Ok(turn_id)
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_names(json: Option<&str>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}
