//! Core domain types for k2d
//!
//! These types describe what is extracted from one conversational turn of an
//! AI coding assistant: the turn itself, the tools, skills and MCP servers it
//! used, and the file and configuration changes observed around it.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Turn** | One real user message plus all assistant activity up to the next one |
//! | **Tool call** | A discrete invocation of a named capability (Read, Bash, ...) |
//! | **Skill** | A named, reusable behavior module invoked through the `Skill` tool |
//! | **MCP call** | A tool exposed by an MCP server, named `mcp__<server>__<tool>` |
//! | **Tracking mode** | How file changes are detected for a project: git or snapshots |

use serde::{Deserialize, Serialize};

// ============================================
// Tools
// ============================================

/// Coarse classification of a tool by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Reads, writes or searches files (Read, Write, Edit, Glob, Grep)
    File,
    /// Executes code (Bash, NotebookEdit)
    Code,
    /// Reaches the web (WebSearch, WebFetch)
    Search,
    /// Exposed by an MCP server (`mcp__` prefix)
    Mcp,
    Other,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::File => "file",
            ToolCategory::Code => "code",
            ToolCategory::Search => "search",
            ToolCategory::Mcp => "mcp",
            ToolCategory::Other => "other",
        }
    }
}

impl std::str::FromStr for ToolCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ToolCategory::File),
            "code" => Ok(ToolCategory::Code),
            "search" => Ok(ToolCategory::Search),
            "mcp" => Ok(ToolCategory::Mcp),
            "other" => Ok(ToolCategory::Other),
            _ => Err(format!("unknown tool category: {}", s)),
        }
    }
}

/// Binary outcome of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success,
    Failure,
}

impl ToolOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOutcome::Success => "success",
            ToolOutcome::Failure => "failure",
        }
    }
}

impl std::str::FromStr for ToolOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ToolOutcome::Success),
            "failure" => Ok(ToolOutcome::Failure),
            _ => Err(format!("unknown tool outcome: {}", s)),
        }
    }
}

/// A single tool invocation inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub category: ToolCategory,
    /// Parameter bag as logged (`{}` when absent)
    pub parameters: serde_json::Value,
    pub outcome: ToolOutcome,
    pub result_summary: Option<String>,
    pub duration_ms: Option<i64>,
}

impl ToolCall {
    /// Identity used for de-duplication within a turn: name plus serialized
    /// parameters. Keys keep their logged order (`preserve_order`).
    pub fn dedup_key(&self) -> (String, String) {
        (self.name.clone(), self.parameters.to_string())
    }
}

// ============================================
// Skills
// ============================================

/// Who triggered a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTrigger {
    User,
    Auto,
}

impl SkillTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillTrigger::User => "user",
            SkillTrigger::Auto => "auto",
        }
    }
}

impl std::str::FromStr for SkillTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SkillTrigger::User),
            "auto" => Ok(SkillTrigger::Auto),
            _ => Err(format!("unknown skill trigger: {}", s)),
        }
    }
}

/// How a skill invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillOutcome {
    Success,
    Partial,
    Failed,
}

impl SkillOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillOutcome::Success => "success",
            SkillOutcome::Partial => "partial",
            SkillOutcome::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SkillOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SkillOutcome::Success),
            "partial" => Ok(SkillOutcome::Partial),
            "failed" => Ok(SkillOutcome::Failed),
            _ => Err(format!("unknown skill outcome: {}", s)),
        }
    }
}

impl From<ToolOutcome> for SkillOutcome {
    fn from(outcome: ToolOutcome) -> Self {
        match outcome {
            ToolOutcome::Success => SkillOutcome::Success,
            ToolOutcome::Failure => SkillOutcome::Failed,
        }
    }
}

/// A skill invocation, derived from a `Skill` tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillUsage {
    pub skill_name: String,
    pub trigger: SkillTrigger,
    /// The `args` the skill was invoked with, if any
    pub context: Option<String>,
    pub outcome: Option<SkillOutcome>,
}

// ============================================
// MCP
// ============================================

/// A call to a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpCall {
    pub server_name: String,
    pub tool_name: String,
    pub request: serde_json::Value,
    /// Never known when the transcript is read
    pub response: Option<serde_json::Value>,
}

// ============================================
// Turn
// ============================================

/// One reconstructed conversational turn.
///
/// Aggregates are de-duplicated and kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Empty when the log holds no real user message for this turn
    pub user_message: String,
    pub assistant_response: String,
    pub tool_calls: Vec<ToolCall>,
    pub skill_usages: Vec<SkillUsage>,
    pub mcp_calls: Vec<McpCall>,
}

// ============================================
// Changes
// ============================================

/// Kind of change, shared by file and configuration changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "D")]
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "A",
            ChangeKind::Modified => "M",
            ChangeKind::Deleted => "D",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(ChangeKind::Added),
            "M" => Ok(ChangeKind::Modified),
            "D" => Ok(ChangeKind::Deleted),
            _ => Err(format!("unknown change kind: {}", s)),
        }
    }
}

/// A file added, modified or deleted during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path relative to the project root
    pub path: String,
    pub kind: ChangeKind,
    pub diff: Option<String>,
    /// Revision the change was observed against (git mode)
    pub commit: Option<String>,
    /// Content hashes before/after (snapshot mode)
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            diff: None,
            commit: None,
            old_hash: None,
            new_hash: None,
        }
    }
}

/// Which configuration artifact a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCategory {
    Settings,
    ClaudeMd,
    Mcp,
    Agent,
    Skill,
    Plugin,
    Rule,
    Command,
}

impl ConfigCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigCategory::Settings => "settings",
            ConfigCategory::ClaudeMd => "claude_md",
            ConfigCategory::Mcp => "mcp",
            ConfigCategory::Agent => "agent",
            ConfigCategory::Skill => "skill",
            ConfigCategory::Plugin => "plugin",
            ConfigCategory::Rule => "rule",
            ConfigCategory::Command => "command",
        }
    }
}

impl std::str::FromStr for ConfigCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "settings" => Ok(ConfigCategory::Settings),
            "claude_md" => Ok(ConfigCategory::ClaudeMd),
            "mcp" => Ok(ConfigCategory::Mcp),
            "agent" => Ok(ConfigCategory::Agent),
            "skill" => Ok(ConfigCategory::Skill),
            "plugin" => Ok(ConfigCategory::Plugin),
            "rule" => Ok(ConfigCategory::Rule),
            "command" => Ok(ConfigCategory::Command),
            _ => Err(format!("unknown config category: {}", s)),
        }
    }
}

/// A change to one configuration artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChange {
    pub category: ConfigCategory,
    /// Set only for list artifacts (agents, skills, ...)
    pub item: Option<String>,
    pub kind: ChangeKind,
    pub before: Option<String>,
    pub after: Option<String>,
    pub summary: String,
}

/// How file changes are detected for a project. Decided once per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    Git,
    Snapshot,
}

impl TrackingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMode::Git => "git",
            TrackingMode::Snapshot => "snapshot",
        }
    }
}

impl std::fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(TrackingMode::Git),
            "snapshot" => Ok(TrackingMode::Snapshot),
            _ => Err(format!("unknown tracking mode: {}", s)),
        }
    }
}

// ============================================
// Inference
// ============================================

/// Development phase of a project, in lifecycle order.
///
/// The declaration order is the priority order used by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Requirements,
    Design,
    Development,
    Testing,
    Deployment,
    Maintenance,
}

impl Phase {
    /// All phases in lifecycle order.
    pub const ALL: [Phase; 7] = [
        Phase::Init,
        Phase::Requirements,
        Phase::Design,
        Phase::Development,
        Phase::Testing,
        Phase::Deployment,
        Phase::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Requirements => "requirements",
            Phase::Design => "design",
            Phase::Development => "development",
            Phase::Testing => "testing",
            Phase::Deployment => "deployment",
            Phase::Maintenance => "maintenance",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phase::Init => "Project initialization",
            Phase::Requirements => "Requirements analysis",
            Phase::Design => "System design",
            Phase::Development => "Development and implementation",
            Phase::Testing => "Testing and verification",
            Phase::Deployment => "Deployment and release",
            Phase::Maintenance => "Maintenance and optimization",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {}", s))
    }
}

/// Confidence attached to a skill-introduction inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
