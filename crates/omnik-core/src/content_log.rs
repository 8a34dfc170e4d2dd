//! Chronological transcript of one turn.
//!
//! Adjacent narration merges into one `Text` entry; every tool call is its own
//! `Tool` entry. Entries are never reordered.

use crate::event::{ContentItem, StreamEvent};
use crate::session::SessionRecord;
use crate::tool_preview::format_tool_preview;

/// Separator placed between entries when the log is rendered.
pub const ENTRY_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Text,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLogEntry {
    pub kind: EntryKind,
    pub content: String,
}

/// Append-only log for the current turn.
#[derive(Debug, Clone, Default)]
pub struct ContentLog {
    entries: Vec<ContentLogEntry>,
}

impl ContentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ContentLogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends narration, merging into the previous entry when that is text too.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.entries.last_mut() {
            Some(last) if last.kind == EntryKind::Text => last.content.push_str(text),
            _ => self.entries.push(ContentLogEntry {
                kind: EntryKind::Text,
                content: text.to_string(),
            }),
        }
    }

    /// Appends a tool entry. Never merged.
    pub fn push_tool(&mut self, preview: String) {
        self.entries.push(ContentLogEntry {
            kind: EntryKind::Tool,
            content: preview,
        });
    }

    /// Full text of the log as shown to the user.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.content.as_str())
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR)
    }
}

/// Folds stream events into a [`ContentLog`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentAggregator;

impl ContentAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Applies one event.
    ///
    /// Returns the correlation id when this event is the one that assigned it to
    /// `record`; the caller must persist it. Later ids are ignored.
    pub fn apply(
        &self,
        event: &StreamEvent,
        log: &mut ContentLog,
        record: &mut SessionRecord,
    ) -> Option<String> {
        match event {
            StreamEvent::SystemInit { correlation_id } => {
                if record.has_correlation_id() || correlation_id.is_empty() {
                    return None;
                }
                record.correlation_id = correlation_id.clone();
                Some(correlation_id.clone())
            }
            StreamEvent::AssistantContent { items } => {
                for item in items {
                    match item {
                        ContentItem::Text { text } => log.push_text(text),
                        ContentItem::ToolUse { name, input } => {
                            let preview = format_tool_preview(name, input);
                            tracing::debug!(tool = %name, preview = %preview, "tool invocation");
                            log.push_tool(preview);
                        }
                    }
                }
                None
            }
            StreamEvent::Terminal | StreamEvent::Malformed(_) => None,
        }
    }
}
