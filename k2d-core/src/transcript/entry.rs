//! Raw transcript lines and their normalized form.
//!
//! A line may carry its role in `role`, `message.role` or `type`, and its body
//! either at the top level or under `message`. Everything is resolved once,
//! here, into an [`Entry`]; nothing downstream probes the raw shape.

use super::extract;
use crate::types::ToolCall;
use serde::Deserialize;

/// One line of the transcript as written by the assistant.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEntry {
    role: Option<String>,
    #[serde(rename = "type")]
    record_type: Option<String>,
    content: Option<RawContent>,
    message: Option<RawMessage>,
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    role: Option<String>,
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<RawBlockItem>),
    // Anything else (numbers, objects)
    Other(serde_json::Value),
}

/// One array element. A block that does not fit [`RawBlock`] is kept as
/// unknown so the rest of the array survives.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBlockItem {
    Known(RawBlock),
    Unknown(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<serde_json::Value>,
    },
    #[serde(rename = "tool_result")]
    ToolResult,
    #[serde(other)]
    Unknown,
}

/// An entry of the explicit `tool_calls` list some assistant lines carry.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RawToolCall {
    pub name: Option<String>,
    pub parameters: Option<serde_json::Value>,
    pub input: Option<serde_json::Value>,
    pub status: Option<String>,
    pub result: Option<serde_json::Value>,
    pub duration_ms: Option<i64>,
}

/// Normalized body of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// No body, or a body of an unrecognized shape
    Missing,
    Text(String),
    Blocks(Vec<Block>),
}

/// Normalized content block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(String),
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    ToolResult,
    Other,
}

impl Content {
    /// Plain text of the body: a string verbatim, or the `text` blocks joined by newlines.
    pub fn text(&self) -> String {
        match self {
            Content::Missing => String::new(),
            Content::Text(text) => text.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    Block::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether a user entry with this body starts a new turn.
    ///
    /// Bodies made only of tool results are echoes of the assistant's own
    /// tool use, not something the user typed.
    pub fn is_turn_boundary(&self) -> bool {
        match self {
            Content::Missing => false,
            Content::Text(_) => true,
            Content::Blocks(blocks) => {
                blocks.is_empty() || !blocks.iter().all(|b| matches!(b, Block::ToolResult))
            }
        }
    }
}

/// Assistant output extracted from one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantEntry {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// A transcript line after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    User(Content),
    Assistant(AssistantEntry),
    /// System records, summaries and anything without a usable role
    Other,
}

impl Entry {
    /// Parse and normalize one JSON line.
    pub fn parse(line: &str) -> serde_json::Result<Entry> {
        let raw: RawEntry = serde_json::from_str(line)?;
        Ok(Entry::from_raw(raw))
    }

    fn from_raw(raw: RawEntry) -> Entry {
        let RawEntry {
            role,
            record_type,
            content,
            message,
            tool_calls,
        } = raw;
        let (message_role, message_content) = match message {
            Some(m) => (m.role, m.content),
            None => (None, None),
        };

        let role = role.or(message_role).or(record_type);
        let content = normalize(content.or(message_content));

        match role.as_deref() {
            Some("user") => Entry::User(content),
            Some("assistant") => {
                let tool_calls = extract::tool_calls(tool_calls.as_deref().unwrap_or(&[]), &content);
                Entry::Assistant(AssistantEntry {
                    text: content.text(),
                    tool_calls,
                })
            }
            _ => Entry::Other,
        }
    }
}

fn normalize(content: Option<RawContent>) -> Content {
    match content {
        Some(RawContent::Text(text)) => Content::Text(text),
        Some(RawContent::Blocks(blocks)) => {
            Content::Blocks(blocks.into_iter().map(normalize_block).collect())
        }
        Some(RawContent::Other(_)) | None => Content::Missing,
    }
}

fn normalize_block(item: RawBlockItem) -> Block {
    let block = match item {
        RawBlockItem::Known(block) => block,
        RawBlockItem::Unknown(_) => return Block::Other,
    };
    match block {
        RawBlock::Text { text } => Block::Text(text.unwrap_or_default()),
        RawBlock::ToolUse {
            name: Some(name),
            input,
        } if !name.is_empty() => Block::ToolUse {
            name,
            input: input
                .filter(|v| !v.is_null())
                .unwrap_or_else(|| serde_json::json!({})),
        },
        RawBlock::ToolUse { .. } => Block::Other,
        RawBlock::ToolResult => Block::ToolResult,
        RawBlock::Unknown => Block::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_resolution_order() {
        let entry = Entry::parse(r#"{"role":"user","type":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(entry, Entry::User(Content::Text("hi".to_string())));

        let entry =
            Entry::parse(r#"{"type":"user","message":{"role":"assistant","content":"ok"}}"#)
                .unwrap();
        assert!(matches!(entry, Entry::Assistant(a) if a.text == "ok"));

        let entry = Entry::parse(r#"{"type":"user","content":"typed"}"#).unwrap();
        assert_eq!(entry, Entry::User(Content::Text("typed".to_string())));

        let entry = Entry::parse(r#"{"type":"summary","summary":"x"}"#).unwrap();
        assert_eq!(entry, Entry::Other);
    }

    #[test]
    fn test_top_level_content_wins() {
        let entry = Entry::parse(
            r#"{"role":"user","content":"top","message":{"role":"user","content":"nested"}}"#,
        )
        .unwrap();
        assert_eq!(entry, Entry::User(Content::Text("top".to_string())));
    }

    #[test]
    fn test_tool_result_only_is_not_boundary() {
        let entry = Entry::parse(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#,
        )
        .unwrap();
        let Entry::User(content) = entry else {
            panic!("expected user entry");
        };
        assert!(!content.is_turn_boundary());
    }

    #[test]
    fn test_mixed_blocks_are_boundary() {
        let content = Content::Blocks(vec![Block::ToolResult, Block::Text("also this".into())]);
        assert!(content.is_turn_boundary());
        assert_eq!(content.text(), "also this");
    }

    #[test]
    fn test_missing_content_is_not_boundary() {
        assert!(!Content::Missing.is_turn_boundary());
        assert!(Content::Blocks(vec![]).is_turn_boundary());
    }

    #[test]
    fn test_text_blocks_joined_with_newline() {
        let entry = Entry::parse(
            r#"{"role":"assistant","content":[{"type":"text","text":"one"},{"type":"thinking","thinking":"..."},{"type":"text","text":"two"}]}"#,
        )
        .unwrap();
        let Entry::Assistant(assistant) = entry else {
            panic!("expected assistant entry");
        };
        assert_eq!(assistant.text, "one\ntwo");
    }

    #[test]
    fn test_untyped_block_keeps_its_siblings() {
        let entry = Entry::parse(
            r#"{"role":"assistant","content":[{"type":"text","text":"kept"},{"source":"x"},{"type":"text","text":7},{"type":"tool_use","id":"t","name":"Read","input":{"file_path":"a.rs"}}]}"#,
        )
        .unwrap();
        let Entry::Assistant(assistant) = entry else {
            panic!("expected assistant entry");
        };
        assert_eq!(assistant.text, "kept");
        assert_eq!(assistant.tool_calls.len(), 1);
        assert_eq!(assistant.tool_calls[0].name, "Read");

        let entry = Entry::parse(r#"{"role":"user","content":[{"note":"no type"}]}"#).unwrap();
        assert_eq!(entry, Entry::User(Content::Blocks(vec![Block::Other])));
    }

    #[test]
    fn test_malformed_line_is_error() {
        assert!(Entry::parse("{not json").is_err());
    }
}
