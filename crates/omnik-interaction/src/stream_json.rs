//! Decoder for the assistant's `--output-format stream-json` lines.
//!
//! Each line is one JSON object discriminated by `type`. Only `system` and
//! `assistant` carry anything we render; every other type, and every unknown
//! content block, decodes to something ignorable instead of an error.

use omnik_core::{ContentItem, MalformedReason, StreamEvent};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawMessage {
    System {
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        message: RawAssistantMessage,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawAssistantMessage {
    #[serde(default)]
    content: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl RawBlock {
    fn into_item(self) -> Option<ContentItem> {
        match self {
            RawBlock::Text { text } => Some(ContentItem::Text { text }),
            RawBlock::ToolUse { name, input } => Some(ContentItem::ToolUse { name, input }),
            RawBlock::Other => None,
        }
    }
}

/// Decodes one line of output. Never fails; bad input becomes [`StreamEvent::Malformed`].
pub fn parse_line(line: &str) -> StreamEvent {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return StreamEvent::Malformed(MalformedReason::InvalidJson(e.to_string())),
    };

    if !value.is_object() {
        return StreamEvent::Malformed(MalformedReason::InvalidJson(
            "expected a JSON object".to_string(),
        ));
    }

    match RawMessage::deserialize(&value) {
        Ok(RawMessage::System { session_id }) => match session_id.filter(|id| !id.is_empty()) {
            Some(correlation_id) => StreamEvent::SystemInit { correlation_id },
            None => StreamEvent::Malformed(MalformedReason::UnexpectedShape(
                "system message without session_id".to_string(),
            )),
        },
        Ok(RawMessage::Assistant { message }) => StreamEvent::AssistantContent {
            items: message
                .content
                .into_iter()
                .filter_map(RawBlock::into_item)
                .collect(),
        },
        Ok(RawMessage::Other) => {
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            StreamEvent::Malformed(MalformedReason::UnhandledType(kind))
        }
        Err(e) => StreamEvent::Malformed(MalformedReason::UnexpectedShape(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_init() {
        let event = parse_line(r#"{"type":"system","subtype":"init","session_id":"3f1c","tools":[]}"#);
        assert_eq!(
            event,
            StreamEvent::SystemInit {
                correlation_id: "3f1c".to_string()
            }
        );
    }

    #[test]
    fn test_assistant_blocks_keep_order() {
        let line = json!({
            "type": "assistant",
            "message": {
                "id": "msg_1",
                "content": [
                    {"type": "text", "text": "Let me look."},
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "tool_use", "id": "t1", "name": "Read", "input": {"file_path": "/a/b.txt"}},
                    {"type": "text", "text": "Done."}
                ]
            }
        })
        .to_string();

        let StreamEvent::AssistantContent { items } = parse_line(&line) else {
            panic!("expected assistant content");
        };
        assert_eq!(
            items,
            vec![
                ContentItem::text("Let me look."),
                ContentItem::tool_use("Read", json!({"file_path": "/a/b.txt"})),
                ContentItem::text("Done."),
            ]
        );
    }

    #[test]
    fn test_unhandled_types_are_malformed_not_errors() {
        assert_eq!(
            parse_line(r#"{"type":"result","subtype":"success","result":"4"}"#),
            StreamEvent::Malformed(MalformedReason::UnhandledType("result".to_string()))
        );
        assert_eq!(
            parse_line(r#"{"type":"user","message":{}}"#),
            StreamEvent::Malformed(MalformedReason::UnhandledType("user".to_string()))
        );
    }

    #[test]
    fn test_garbage_lines() {
        assert!(matches!(
            parse_line("not json"),
            StreamEvent::Malformed(MalformedReason::InvalidJson(_))
        ));
        assert!(matches!(
            parse_line("[1,2]"),
            StreamEvent::Malformed(MalformedReason::InvalidJson(_))
        ));
        assert!(matches!(
            parse_line(r#"{"no_type":true}"#),
            StreamEvent::Malformed(MalformedReason::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_line(r#"{"type":"assistant"}"#),
            StreamEvent::Malformed(MalformedReason::UnexpectedShape(_))
        ));
        assert!(matches!(
            parse_line(r#"{"type":"system","subtype":"init"}"#),
            StreamEvent::Malformed(MalformedReason::UnexpectedShape(_))
        ));
    }
}
