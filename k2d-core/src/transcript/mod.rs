//! Turn reconstruction from an append-only transcript.
//!
//! A transcript is a JSONL file: one [`Entry`] per line. A turn is one real
//! user message plus every assistant entry up to the next real user message.
//! User entries that only echo tool results do not start a turn.
//!
//! Both read modes share one forward fold, [`segments`]:
//! - [`full_history`] keeps every segment that has a user message and at
//!   least one assistant entry.
//! - [`latest_turn`] takes the last segment, whatever it holds.
//!
//! # Error Handling
//!
//! - **Malformed JSON lines**: logged and skipped, the scan continues.
//! - **Missing or unreadable file**: returned as [`Error::Transcript`].

pub mod entry;
pub mod extract;

pub use entry::{AssistantEntry, Block, Content, Entry};

use crate::error::{Error, Result};
use crate::redact::redact;
use crate::types::Turn;
use std::collections::HashSet;
use std::path::Path;

/// A run of entries opened by a real user message.
///
/// The first segment of a log has no user message when the log starts with
/// assistant output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub user: Option<String>,
    pub assistants: Vec<AssistantEntry>,
}

impl Segment {
    fn opened_by(user: String) -> Self {
        Self {
            user: Some(user),
            assistants: Vec::new(),
        }
    }

    /// Whether this segment forms a complete turn.
    pub fn is_complete(&self) -> bool {
        self.user.is_some() && !self.assistants.is_empty()
    }

    /// Aggregate the segment into a [`Turn`], redacting both text fields.
    pub fn into_turn(self) -> Turn {
        let mut turn = Turn::default();
        let mut seen_calls = HashSet::new();
        let mut seen_skills = HashSet::new();

        for assistant in self.assistants {
            if !assistant.text.is_empty() {
                if !turn.assistant_response.is_empty() {
                    turn.assistant_response.push('\n');
                }
                turn.assistant_response.push_str(&assistant.text);
            }

            for usage in extract::skill_usages(&assistant.tool_calls) {
                if seen_skills.insert(usage.skill_name.clone()) {
                    turn.skill_usages.push(usage);
                }
            }
            turn.mcp_calls
                .extend(extract::mcp_calls(&assistant.tool_calls));

            for call in assistant.tool_calls {
                if seen_calls.insert(call.dedup_key()) {
                    turn.tool_calls.push(call);
                }
            }
        }

        turn.user_message = redact(self.user.as_deref().unwrap_or_default());
        turn.assistant_response = redact(&turn.assistant_response);
        turn
    }
}

/// Lazy fold of entries into segments.
pub struct Segments<I> {
    entries: I,
    pending: Option<Segment>,
}

impl<I> Iterator for Segments<I>
where
    I: Iterator<Item = Entry>,
{
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        for entry in self.entries.by_ref() {
            match entry {
                Entry::User(content) if content.is_turn_boundary() => {
                    let finished = self.pending.replace(Segment::opened_by(content.text()));
                    if finished.is_some() {
                        return finished;
                    }
                }
                Entry::Assistant(assistant) => self
                    .pending
                    .get_or_insert_with(Segment::default)
                    .assistants
                    .push(assistant),
                // Tool-result echoes and non-conversational records
                Entry::User(_) | Entry::Other => {}
            }
        }
        self.pending.take()
    }
}

/// Fold entries into segments, in log order.
pub fn segments<I>(entries: I) -> Segments<I::IntoIter>
where
    I: IntoIterator<Item = Entry>,
{
    Segments {
        entries: entries.into_iter(),
        pending: None,
    }
}

/// Parse transcript text, skipping blank and malformed lines.
pub fn parse_entries(content: &str) -> Vec<Entry> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match Entry::parse(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(line = idx + 1, error = %e, "Skipping malformed transcript line");
                None
            }
        })
        .collect()
}

/// Read and parse a transcript file.
///
/// Invalid UTF-8 is replaced rather than rejected, so a corrupt line only
/// affects itself.
pub fn read_entries(path: &Path) -> Result<Vec<Entry>> {
    let bytes = std::fs::read(path).map_err(|e| Error::Transcript {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(parse_entries(&String::from_utf8_lossy(&bytes)))
}

/// The last turn of a sequence of entries.
///
/// With no real user message the turn's user text is empty, but assistant
/// data is still returned.
pub fn latest_turn_of<I>(entries: I) -> Turn
where
    I: IntoIterator<Item = Entry>,
{
    segments(entries)
        .last()
        .map(Segment::into_turn)
        .unwrap_or_default()
}

/// Every complete turn of a sequence of entries, in order.
pub fn full_history_of<I>(entries: I) -> Vec<Turn>
where
    I: IntoIterator<Item = Entry>,
{
    segments(entries)
        .filter(Segment::is_complete)
        .map(Segment::into_turn)
        .collect()
}

/// The latest turn of the transcript at `path`.
pub fn latest_turn(path: &Path) -> Result<Turn> {
    let entries = read_entries(path)?;
    let turn = latest_turn_of(entries);
    tracing::debug!(
        path = %path.display(),
        tool_calls = turn.tool_calls.len(),
        "Parsed latest turn"
    );
    Ok(turn)
}

/// Every complete turn of the transcript at `path`.
pub fn full_history(path: &Path) -> Result<Vec<Turn>> {
    let entries = read_entries(path)?;
    let turns = full_history_of(entries);
    tracing::debug!(path = %path.display(), turns = turns.len(), "Parsed full transcript");
    Ok(turns)
}
