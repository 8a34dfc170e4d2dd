//! Typed events decoded from the assistant's stream-json output.

use serde_json::Value;

/// One item of an assistant message, in the order the assistant produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Narration text.
    Text { text: String },
    /// A tool invocation with its raw input object.
    ToolUse { name: String, input: Value },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_use(name: impl Into<String>, input: Value) -> Self {
        Self::ToolUse {
            name: name.into(),
            input,
        }
    }
}

/// Why a line could not be turned into a useful event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The line is not a JSON object.
    InvalidJson(String),
    /// Valid JSON with a `type` this system does not handle (`user`, `result`, ...).
    UnhandledType(String),
    /// A handled `type` whose payload is missing the fields we need.
    UnexpectedShape(String),
}

/// One parsed unit of the assistant's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The assistant announced its conversation id.
    SystemInit { correlation_id: String },
    /// Narration and tool calls, in stream order.
    AssistantContent { items: Vec<ContentItem> },
    /// The process ended normally and its output is drained.
    Terminal,
    /// Dropped after logging.
    Malformed(MalformedReason),
}
