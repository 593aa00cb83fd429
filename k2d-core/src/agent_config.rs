//! Assistant configuration tracking.
//!
//! Captures the project's `.claude/` configuration (settings, instructions,
//! MCP and LSP config, agents, skills, plugins, rules, commands) and diffs two
//! captures into [`ConfigChange`] records.
//!
//! Every read is best effort: a missing file is `None`, a missing directory an
//! empty list.

use crate::diff::diff_items;
use crate::types::{ChangeKind, ConfigCategory, ConfigChange};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CLAUDE_DIR: &str = ".claude";

/// State of the assistant configuration at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfigSnapshot {
    pub settings_json: Option<String>,
    pub settings_local_json: Option<String>,
    /// Root `CLAUDE.md`, falling back to `.claude/CLAUDE.md`
    pub claude_md: Option<String>,
    pub mcp_json: Option<String>,
    pub lsp_json: Option<String>,
    pub agents: Vec<String>,
    /// Skill directories holding a `SKILL.md`
    pub skills: Vec<String>,
    /// Plugin directories holding `.claude-plugin/plugin.json`
    pub plugins: Vec<String>,
    pub rules: Vec<String>,
    pub commands: Vec<String>,
}

impl AgentConfigSnapshot {
    /// Read the configuration of the project at `project`.
    pub fn capture(project: &Path) -> Self {
        let claude = project.join(CLAUDE_DIR);

        let claude_md = read_optional(&project.join("CLAUDE.md"))
            .filter(|s| !s.is_empty())
            .or_else(|| read_optional(&claude.join("CLAUDE.md")).filter(|s| !s.is_empty()));

        Self {
            settings_json: read_optional(&claude.join("settings.json")),
            settings_local_json: read_optional(&claude.join("settings.local.json")),
            claude_md,
            mcp_json: read_optional(&claude.join(".mcp.json")),
            lsp_json: read_optional(&claude.join("lsp.json")),
            agents: markdown_names(&claude.join("agents")),
            skills: marked_dirs(&claude.join("skills"), &["SKILL.md"]),
            plugins: marked_dirs(&claude.join("plugins"), &[".claude-plugin", "plugin.json"]),
            rules: markdown_names(&claude.join("rules")),
            commands: markdown_names(&claude.join("commands")),
        }
    }

    fn scalars(&self) -> [(ConfigCategory, &'static str, &Option<String>); 3] {
        [
            (ConfigCategory::Settings, "settings.json", &self.settings_json),
            (ConfigCategory::ClaudeMd, "CLAUDE.md", &self.claude_md),
            (ConfigCategory::Mcp, ".mcp.json", &self.mcp_json),
        ]
    }

    fn lists(&self) -> [(ConfigCategory, &Vec<String>); 5] {
        [
            (ConfigCategory::Agent, &self.agents),
            (ConfigCategory::Skill, &self.skills),
            (ConfigCategory::Plugin, &self.plugins),
            (ConfigCategory::Rule, &self.rules),
            (ConfigCategory::Command, &self.commands),
        ]
    }
}

fn read_optional(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Stems of `*.md` files directly under `dir`, sorted.
fn markdown_names(dir: &Path) -> Vec<String> {
    let pattern = format!("{}/*.md", glob::Pattern::escape(&dir.to_string_lossy()));
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    let mut names: Vec<String> = paths
        .filter_map(|p| p.ok())
        .filter(|p| p.is_file())
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

/// Names of sub-directories of `dir` that contain the marker file `marker`
/// (given as path components), sorted.
fn marked_dirs(dir: &Path, marker: &[&str]) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter(|e| {
            let marker_path = marker.iter().fold(e.path(), |p, part| p.join(part));
            marker_path.is_file()
        })
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Changes between two configuration captures.
///
/// Without a previous capture, everything present in `new` is an addition.
/// Scalars compare by exact text; lists compare by membership, so a renamed
/// item shows as one deletion plus one addition.
pub fn detect_changes(old: Option<&AgentConfigSnapshot>, new: &AgentConfigSnapshot) -> Vec<ConfigChange> {
    let empty = AgentConfigSnapshot::default();
    let old = old.unwrap_or(&empty);
    let mut changes = Vec::new();

    for ((category, label, before), (_, _, after)) in old.scalars().into_iter().zip(new.scalars()) {
        let kind = match (before, after) {
            (Some(b), Some(a)) if b != a => ChangeKind::Modified,
            (None, Some(_)) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Deleted,
            _ => continue,
        };
        let verb = match kind {
            ChangeKind::Added => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "removed",
        };
        changes.push(ConfigChange {
            category,
            item: None,
            kind,
            before: before.clone(),
            after: after.clone(),
            summary: format!("{} {}", label, verb),
        });
    }

    for ((category, before), (_, after)) in old.lists().into_iter().zip(new.lists()) {
        let (added, removed) = diff_items(before, after);
        for item in added {
            changes.push(ConfigChange {
                category,
                summary: format!("{} '{}' added", category.as_str(), item),
                item: Some(item.clone()),
                kind: ChangeKind::Added,
                before: None,
                after: Some(item),
            });
        }
        for item in removed {
            changes.push(ConfigChange {
                category,
                summary: format!("{} '{}' removed", category.as_str(), item),
                item: Some(item.clone()),
                kind: ChangeKind::Deleted,
                before: Some(item),
                after: None,
            });
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_capture_reads_everything() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".claude/settings.json", "{\"a\":1}");
        write(root, ".claude/CLAUDE.md", "nested instructions");
        write(root, ".claude/.mcp.json", "{}");
        write(root, ".claude/agents/reviewer.md", "x");
        write(root, ".claude/agents/notes.txt", "x");
        write(root, ".claude/rules/style.md", "x");
        write(root, ".claude/commands/ship.md", "x");
        write(root, ".claude/skills/dev-coding/SKILL.md", "x");
        std::fs::create_dir_all(root.join(".claude/skills/half-done")).unwrap();
        write(root, ".claude/plugins/fmt/.claude-plugin/plugin.json", "{}");
        write(root, ".claude/plugins/broken/plugin.json", "{}");

        let snap = AgentConfigSnapshot::capture(root);
        assert_eq!(snap.settings_json.as_deref(), Some("{\"a\":1}"));
        assert_eq!(snap.settings_local_json, None);
        assert_eq!(snap.claude_md.as_deref(), Some("nested instructions"));
        assert_eq!(snap.mcp_json.as_deref(), Some("{}"));
        assert_eq!(snap.agents, vec!["reviewer"]);
        assert_eq!(snap.skills, vec!["dev-coding"]);
        assert_eq!(snap.plugins, vec!["fmt"]);
        assert_eq!(snap.rules, vec!["style"]);
        assert_eq!(snap.commands, vec!["ship"]);
    }

    #[test]
    fn test_root_instructions_win() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "CLAUDE.md", "root");
        write(dir.path(), ".claude/CLAUDE.md", "nested");
        let snap = AgentConfigSnapshot::capture(dir.path());
        assert_eq!(snap.claude_md.as_deref(), Some("root"));
    }

    #[test]
    fn test_missing_config_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(AgentConfigSnapshot::capture(dir.path()), AgentConfigSnapshot::default());
    }

    #[test]
    fn test_removed_skill() {
        let old = AgentConfigSnapshot {
            skills: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        let new = AgentConfigSnapshot {
            skills: vec!["a".into()],
            ..Default::default()
        };
        let changes = detect_changes(Some(&old), &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category, ConfigCategory::Skill);
        assert_eq!(changes[0].item.as_deref(), Some("b"));
        assert_eq!(changes[0].kind, ChangeKind::Deleted);
    }

    #[test]
    fn test_scalar_kinds() {
        let old = AgentConfigSnapshot {
            settings_json: Some("{}".into()),
            claude_md: Some("old".into()),
            ..Default::default()
        };
        let new = AgentConfigSnapshot {
            claude_md: Some("new".into()),
            mcp_json: Some("{}".into()),
            ..Default::default()
        };
        let changes = detect_changes(Some(&old), &new);
        let kinds: Vec<_> = changes.iter().map(|c| (c.category, c.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (ConfigCategory::Settings, ChangeKind::Deleted),
                (ConfigCategory::ClaudeMd, ChangeKind::Modified),
                (ConfigCategory::Mcp, ChangeKind::Added),
            ]
        );
        assert_eq!(changes[1].before.as_deref(), Some("old"));
        assert_eq!(changes[1].summary, "CLAUDE.md modified");
    }

    #[test]
    fn test_first_capture_records_everything_present() {
        let new = AgentConfigSnapshot {
            settings_json: Some("{}".into()),
            claude_md: Some("rules".into()),
            agents: vec!["reviewer".into()],
            commands: vec!["ship".into()],
            ..Default::default()
        };
        let changes = detect_changes(None, &new);
        assert_eq!(changes.len(), 4);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
        assert_eq!(changes[2].summary, "agent 'reviewer' added");
    }

    #[test]
    fn test_unchanged_is_silent() {
        let snap = AgentConfigSnapshot {
            settings_json: Some("{}".into()),
            rules: vec!["x".into()],
            ..Default::default()
        };
        assert!(detect_changes(Some(&snap), &snap.clone()).is_empty());
    }
}
