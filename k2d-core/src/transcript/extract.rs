//! Tool, skill and MCP extraction from a single assistant entry.

use super::entry::{Block, Content, RawToolCall};
use crate::types::{
    McpCall, SkillTrigger, SkillUsage, ToolCall, ToolCategory, ToolOutcome,
};

const FILE_TOOLS: &[&str] = &["Read", "Write", "Edit", "Glob", "Grep"];
const CODE_TOOLS: &[&str] = &["Bash", "NotebookEdit"];
const SEARCH_TOOLS: &[&str] = &["WebSearch", "WebFetch"];

const MCP_PREFIX: &str = "mcp__";
const SKILL_TOOL: &str = "Skill";

/// Classify a tool by its name.
pub fn classify(name: &str) -> ToolCategory {
    if FILE_TOOLS.contains(&name) {
        ToolCategory::File
    } else if CODE_TOOLS.contains(&name) {
        ToolCategory::Code
    } else if SEARCH_TOOLS.contains(&name) {
        ToolCategory::Search
    } else if name.starts_with(MCP_PREFIX) {
        ToolCategory::Mcp
    } else {
        ToolCategory::Other
    }
}

/// Tool calls of one entry.
///
/// The explicit list comes first, then `tool_use` blocks whose name is not
/// already present in this entry.
pub fn tool_calls(listed: &[RawToolCall], content: &Content) -> Vec<ToolCall> {
    let mut calls: Vec<ToolCall> = listed.iter().filter_map(from_listed).collect();

    if let Content::Blocks(blocks) = content {
        for block in blocks {
            let Block::ToolUse { name, input } = block else {
                continue;
            };
            if calls.iter().any(|c| &c.name == name) {
                continue;
            }
            calls.push(ToolCall {
                name: name.clone(),
                category: classify(name),
                parameters: input.clone(),
                outcome: ToolOutcome::Success,
                result_summary: None,
                duration_ms: None,
            });
        }
    }

    calls
}

fn from_listed(raw: &RawToolCall) -> Option<ToolCall> {
    let name = raw.name.as_deref().filter(|n| !n.is_empty())?;

    let parameters = [&raw.parameters, &raw.input]
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    let outcome = match raw.status.as_deref() {
        Some("success") => ToolOutcome::Success,
        _ => ToolOutcome::Failure,
    };

    let result_summary = match &raw.result {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) | None => None,
        Some(other) => Some(other.to_string()),
    };

    Some(ToolCall {
        name: name.to_string(),
        category: classify(name),
        parameters,
        outcome,
        result_summary,
        duration_ms: raw.duration_ms.filter(|ms| *ms > 0),
    })
}

/// Skill usages carried by `Skill` tool calls that name a skill.
pub fn skill_usages(calls: &[ToolCall]) -> Vec<SkillUsage> {
    calls
        .iter()
        .filter(|call| call.name == SKILL_TOOL)
        .filter_map(|call| {
            let skill = call.parameters.get("skill")?.as_str()?;
            if skill.is_empty() {
                return None;
            }
            let context = call
                .parameters
                .get("args")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            Some(SkillUsage {
                skill_name: skill.to_string(),
                trigger: SkillTrigger::User,
                context,
                outcome: Some(call.outcome.into()),
            })
        })
        .collect()
}

/// Split `mcp__<server>__<tool...>` into server and tool.
///
/// The tool part may itself contain `__` and is rejoined.
pub fn split_mcp_name(name: &str) -> Option<(&str, String)> {
    if !name.starts_with(MCP_PREFIX) {
        return None;
    }
    let parts: Vec<&str> = name.split("__").collect();
    if parts.len() < 3 {
        return None;
    }
    Some((parts[1], parts[2..].join("__")))
}

/// MCP calls among the tool calls of one entry. Not de-duplicated.
pub fn mcp_calls(calls: &[ToolCall]) -> Vec<McpCall> {
    calls
        .iter()
        .filter_map(|call| {
            let (server, tool) = split_mcp_name(&call.name)?;
            Some(McpCall {
                server_name: server.to_string(),
                tool_name: tool,
                request: call.parameters.clone(),
                response: None,
            })
        })
        .collect()
}
