//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Turns and what happened in them
    -- ============================================

    CREATE TABLE IF NOT EXISTS sessions (
        id           TEXT PRIMARY KEY,
        project_path TEXT NOT NULL,
        started_at   DATETIME NOT NULL,
        ended_at     DATETIME,
        turn_count   INTEGER NOT NULL DEFAULT 0,
        created_at   DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS turns (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id         TEXT NOT NULL REFERENCES sessions(id),
        turn_number        INTEGER NOT NULL,
        user_message       TEXT,
        assistant_response TEXT,
        created_at         DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tool_calls (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id           INTEGER NOT NULL REFERENCES turns(id),
        tool_name         TEXT NOT NULL,
        tool_type         TEXT,
        parameters        JSON,
        result_status     TEXT,
        result_summary    TEXT,
        execution_time_ms INTEGER,
        called_at         DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS file_changes (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id      INTEGER NOT NULL REFERENCES turns(id),
        file_path    TEXT NOT NULL,
        change_type  TEXT NOT NULL CHECK(change_type IN ('A', 'M', 'D')),
        diff_content TEXT,
        commit_hash  TEXT,
        old_hash     TEXT,
        new_hash     TEXT,
        changed_at   DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS mcp_calls (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id     INTEGER NOT NULL REFERENCES turns(id),
        server_name TEXT NOT NULL,
        tool_name   TEXT NOT NULL,
        request     JSON,
        response    JSON,
        called_at   DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS skill_usages (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id      INTEGER NOT NULL REFERENCES turns(id),
        skill_name   TEXT NOT NULL,
        trigger_type TEXT CHECK(trigger_type IN ('user', 'auto')),
        context      TEXT,
        outcome      TEXT CHECK(outcome IN ('success', 'partial', 'failed')),
        used_at      DATETIME NOT NULL
    );

    -- ============================================
    -- Assistant configuration tracking
    -- ============================================

    CREATE TABLE IF NOT EXISTS config_snapshots (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id             INTEGER NOT NULL REFERENCES turns(id),
        settings_json       TEXT,
        settings_local_json TEXT,
        claude_md           TEXT,
        mcp_json            TEXT,
        lsp_json            TEXT,
        agents_list         JSON,
        skills_list         JSON,
        plugins_list        JSON,
        rules_list          JSON,
        commands_list       JSON,
        created_at          DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS config_changes (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id         INTEGER NOT NULL REFERENCES turns(id),
        config_type     TEXT NOT NULL,
        item_name       TEXT,
        change_type     TEXT NOT NULL CHECK(change_type IN ('A', 'M', 'D')),
        before_value    TEXT,
        after_value     TEXT,
        diff_summary    TEXT,
        trigger_context TEXT,
        related_task    TEXT,
        changed_at      DATETIME NOT NULL
    );

    -- ============================================
    -- Derived knowledge
    -- ============================================

    CREATE TABLE IF NOT EXISTS skill_lifecycle (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        skill_name          TEXT NOT NULL UNIQUE,
        introduced_at       DATETIME,
        introduced_turn_id  INTEGER,
        introduction_reason TEXT,
        total_usages        INTEGER NOT NULL DEFAULT 0,
        last_used_at        DATETIME,
        success_rate        REAL,
        is_active           BOOLEAN NOT NULL DEFAULT 1,
        removed_at          DATETIME,
        removal_reason      TEXT
    );

    CREATE TABLE IF NOT EXISTS project_phases (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        phase_name      TEXT NOT NULL,
        started_at      DATETIME NOT NULL,
        ended_at        DATETIME,
        started_turn_id INTEGER,
        ended_turn_id   INTEGER,
        dominant_skills JSON,
        dominant_tools  JSON,
        lessons_learned TEXT
    );

    -- ============================================
    -- Bookkeeping
    -- ============================================

    -- Snapshot bodies live as files under meta/snapshots
    CREATE TABLE IF NOT EXISTS snapshots (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        turn_id     INTEGER NOT NULL REFERENCES turns(id),
        file_path   TEXT NOT NULL,
        file_count  INTEGER NOT NULL,
        total_bytes INTEGER NOT NULL,
        created_at  DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_turn ON tool_calls(turn_id);
    CREATE INDEX IF NOT EXISTS idx_file_changes_turn ON file_changes(turn_id);
    CREATE INDEX IF NOT EXISTS idx_mcp_calls_turn ON mcp_calls(turn_id);
    CREATE INDEX IF NOT EXISTS idx_skill_usages_turn ON skill_usages(turn_id);
    CREATE INDEX IF NOT EXISTS idx_config_snapshots_turn ON config_snapshots(turn_id);
    CREATE INDEX IF NOT EXISTS idx_config_changes_turn ON config_changes(turn_id);
    CREATE INDEX IF NOT EXISTS idx_snapshots_turn ON snapshots(turn_id);
    "#,
];

/// Tables every migrated store holds
pub const TABLES: &[&str] = &[
    "sessions",
    "turns",
    "tool_calls",
    "file_changes",
    "mcp_calls",
    "skill_usages",
    "config_snapshots",
    "config_changes",
    "skill_lifecycle",
    "project_phases",
    "snapshots",
    "config",
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
