//! Backend session event protocol.
//!
//! The backend CLI emits newline-delimited JSON, one event object per line,
//! tagged by `type`. Live stream output uses snake_case keys while the
//! backend's persisted history files use camelCase for the same fields
//! (`parent_tool_use_id` vs `parentToolUseId`); parsing accepts both.
//!
//! Unknown event types and unknown content-block types are retained with
//! their raw value instead of being dropped, so downstream consumers can
//! still show a fallback rendering.

use anyhow::{Context, Result, ensure};
use serde_json::Value;

// ===== Content blocks =====

/// One item of a message's content array.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// Plain assistant or user text.
    Text { text: String },

    /// Extended-thinking text.
    Thinking { thinking: String },

    /// A tool invocation requested by the assistant.
    ToolUse { id: String, name: String, input: Value },

    /// The outcome of a tool invocation, echoed back on the user side.
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },

    /// Unrecognized block type; raw value retained.
    Other(Value),
}

impl ContentBlock {
    fn parse(value: &Value) -> ContentBlock {
        match value.get("type").and_then(Value::as_str) {
            Some("text") => ContentBlock::Text {
                text: str_value(value, "text").unwrap_or_default(),
            },
            Some("thinking") => ContentBlock::Thinking {
                thinking: str_value(value, "thinking").unwrap_or_default(),
            },
            Some("tool_use") => ContentBlock::ToolUse {
                id: str_value(value, "id").unwrap_or_default(),
                name: str_value(value, "name").unwrap_or_default(),
                input: value.get("input").cloned().unwrap_or(Value::Null),
            },
            Some("tool_result") => ContentBlock::ToolResult {
                tool_use_id: str_alias(value, "tool_use_id", "toolUseId").unwrap_or_default(),
                content: value.get("content").cloned().unwrap_or(Value::Null),
                is_error: bool_alias(value, "is_error", "isError"),
            },
            _ => ContentBlock::Other(value.clone()),
        }
    }
}

/// A message's content: either a bare string or an array of typed blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    fn parse(value: Option<&Value>) -> MessageContent {
        match value {
            Some(Value::String(s)) => MessageContent::Text(s.clone()),
            Some(Value::Array(items)) => {
                MessageContent::Blocks(items.iter().map(ContentBlock::parse).collect())
            }
            _ => MessageContent::Blocks(Vec::new()),
        }
    }

    /// True when the content carries at least one text-typed item.
    pub fn has_text(&self) -> bool {
        match self {
            MessageContent::Text(s) => !s.is_empty(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::Text { .. })),
        }
    }

    /// True when the content carries at least one tool-result item.
    pub fn has_tool_result(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolResult { .. })),
        }
    }

    /// Joins all text-typed items into one string, if any exist.
    pub fn text(&self) -> Option<String> {
        match self {
            MessageContent::Text(s) => (!s.is_empty()).then(|| s.clone()),
            MessageContent::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                (!parts.is_empty()).then(|| parts.join("\n"))
            }
        }
    }
}

// ===== Events =====

/// A parsed backend stream event.
///
/// The `type` tag is an open set; recognized tags get a typed variant and
/// everything else lands in [`SessionEvent::Other`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake metadata (carries the session id on `subtype = "init"`).
    System(SystemEvent),
    /// Assistant output: text, thinking, and tool invocations.
    Assistant(MessageEvent),
    /// User-side traffic: prompts and tool results, including sub-agent lines.
    User(MessageEvent),
    /// Final line of a turn.
    Result(ResultEvent),
    /// Compacted-history summary line.
    Summary(SummaryEvent),
    /// Unrecognized event type; raw value retained.
    Other(OtherEvent),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemEvent {
    pub subtype: Option<String>,
    pub session_id: Option<String>,
    pub model: Option<String>,
    pub cwd: Option<String>,
}

/// Shared shape of `assistant` and `user` events.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub content: MessageContent,
    pub parent_tool_use_id: Option<String>,
    pub is_sidechain: bool,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultEvent {
    pub subtype: Option<String>,
    pub is_error: bool,
    pub result: Option<String>,
    pub session_id: Option<String>,
    pub duration_ms: Option<u64>,
    pub total_cost_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryEvent {
    pub summary: Option<String>,
    pub leaf_uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtherEvent {
    pub kind: String,
    pub raw: Value,
}

impl SessionEvent {
    /// Parses one stream line.
    ///
    /// Errors only when the line is not a JSON object; unknown event types
    /// parse successfully into [`SessionEvent::Other`].
    pub fn from_json_line(line: &str) -> Result<SessionEvent> {
        let value: Value =
            serde_json::from_str(line).context("Failed to parse backend stream line as JSON")?;
        ensure!(
            value.is_object(),
            "Backend stream line is not a JSON object"
        );
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> SessionEvent {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "system" => SessionEvent::System(SystemEvent {
                subtype: str_value(value, "subtype"),
                session_id: str_alias(value, "session_id", "sessionId"),
                model: str_value(value, "model"),
                cwd: str_value(value, "cwd"),
            }),
            "assistant" => SessionEvent::Assistant(MessageEvent::parse(value)),
            "user" => SessionEvent::User(MessageEvent::parse(value)),
            "result" => SessionEvent::Result(ResultEvent {
                subtype: str_value(value, "subtype"),
                is_error: bool_alias(value, "is_error", "isError"),
                result: str_value(value, "result"),
                session_id: str_alias(value, "session_id", "sessionId"),
                duration_ms: value.get("duration_ms").and_then(Value::as_u64),
                total_cost_usd: value.get("total_cost_usd").and_then(Value::as_f64),
            }),
            "summary" => SessionEvent::Summary(SummaryEvent {
                summary: str_value(value, "summary"),
                leaf_uuid: str_alias(value, "leaf_uuid", "leafUuid"),
            }),
            other => SessionEvent::Other(OtherEvent {
                kind: if other.is_empty() {
                    "unknown".to_string()
                } else {
                    other.to_string()
                },
                raw: value.clone(),
            }),
        }
    }

    /// The wire tag of this event.
    pub fn kind(&self) -> &str {
        match self {
            SessionEvent::System(_) => "system",
            SessionEvent::Assistant(_) => "assistant",
            SessionEvent::User(_) => "user",
            SessionEvent::Result(_) => "result",
            SessionEvent::Summary(_) => "summary",
            SessionEvent::Other(o) => &o.kind,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionEvent::System(e) => e.session_id.as_deref(),
            SessionEvent::Assistant(e) | SessionEvent::User(e) => e.session_id.as_deref(),
            SessionEvent::Result(e) => e.session_id.as_deref(),
            SessionEvent::Summary(_) | SessionEvent::Other(_) => None,
        }
    }

    pub fn parent_tool_use_id(&self) -> Option<&str> {
        match self {
            SessionEvent::Assistant(e) | SessionEvent::User(e) => e.parent_tool_use_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_sidechain(&self) -> bool {
        match self {
            SessionEvent::Assistant(e) | SessionEvent::User(e) => e.is_sidechain,
            _ => false,
        }
    }

    /// Message content, for the two message-bearing variants.
    pub fn content(&self) -> Option<&MessageContent> {
        match self {
            SessionEvent::Assistant(e) | SessionEvent::User(e) => Some(&e.content),
            _ => None,
        }
    }
}

impl MessageEvent {
    fn parse(value: &Value) -> MessageEvent {
        // Live stream wraps content in a `message` envelope; some history
        // lines carry `content` at the top level.
        let content_value = value
            .get("message")
            .and_then(|m| m.get("content"))
            .or_else(|| value.get("content"));

        MessageEvent {
            content: MessageContent::parse(content_value),
            parent_tool_use_id: str_alias(value, "parent_tool_use_id", "parentToolUseId"),
            is_sidechain: bool_alias(value, "is_sidechain", "isSidechain"),
            session_id: str_alias(value, "session_id", "sessionId"),
        }
    }
}

// ===== Field helpers =====

fn str_value(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn str_alias(value: &Value, snake: &str, camel: &str) -> Option<String> {
    str_value(value, snake).or_else(|| str_value(value, camel))
}

fn bool_alias(value: &Value, snake: &str, camel: &str) -> bool {
    value
        .get(snake)
        .or_else(|| value.get(camel))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_system_init() {
        let line = r#"{"type":"system","subtype":"init","session_id":"abc-123","model":"claude-sonnet-4-5","cwd":"/work"}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        let SessionEvent::System(system) = &event else {
            panic!("expected system event, got {event:?}");
        };
        assert_eq!(system.subtype.as_deref(), Some("init"));
        assert_eq!(system.session_id.as_deref(), Some("abc-123"));
        assert_eq!(event.session_id(), Some("abc-123"));
        assert_eq!(event.kind(), "system");
    }

    #[test]
    fn test_parse_assistant_with_blocks() {
        let line = r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"hi"},{"type":"tool_use","id":"toolu_1","name":"Task","input":{"prompt":"go"}}]},"session_id":"abc"}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        let SessionEvent::Assistant(msg) = &event else {
            panic!("expected assistant event");
        };
        let MessageContent::Blocks(blocks) = &msg.content else {
            panic!("expected block content");
        };
        assert_eq!(blocks.len(), 2);
        assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "hi"));
        assert!(
            matches!(&blocks[1], ContentBlock::ToolUse { id, name, .. } if id == "toolu_1" && name == "Task")
        );
    }

    #[test]
    fn test_parse_user_tool_result_snake_case() {
        let line = r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_1","content":"done"}]},"parent_tool_use_id":"toolu_1","session_id":"abc"}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        assert_eq!(event.parent_tool_use_id(), Some("toolu_1"));
        assert!(event.content().unwrap().has_tool_result());
        assert!(!event.content().unwrap().has_text());
    }

    #[test]
    fn test_parse_history_camel_case() {
        let line = r#"{"type":"user","message":{"role":"user","content":[{"type":"text","text":"investigate"}]},"parentToolUseId":"toolu_9","isSidechain":true,"sessionId":"abc"}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        assert_eq!(event.parent_tool_use_id(), Some("toolu_9"));
        assert!(event.is_sidechain());
        assert_eq!(event.session_id(), Some("abc"));
        assert!(event.content().unwrap().has_text());
    }

    #[test]
    fn test_parse_string_content() {
        let line = r#"{"type":"user","message":{"role":"user","content":"plain prompt"}}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        assert!(event.content().unwrap().has_text());
        assert_eq!(
            event.content().unwrap().text().as_deref(),
            Some("plain prompt")
        );
    }

    #[test]
    fn test_parse_result() {
        let line = r#"{"type":"result","subtype":"success","is_error":false,"result":"All done.","session_id":"abc","duration_ms":1200,"total_cost_usd":0.03}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        let SessionEvent::Result(result) = &event else {
            panic!("expected result event");
        };
        assert!(!result.is_error);
        assert_eq!(result.result.as_deref(), Some("All done."));
        assert_eq!(result.duration_ms, Some(1200));
    }

    #[test]
    fn test_unknown_type_retained() {
        let line = r#"{"type":"telemetry","payload":{"x":1}}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        let SessionEvent::Other(other) = &event else {
            panic!("expected other event");
        };
        assert_eq!(other.kind, "telemetry");
        assert_eq!(other.raw["payload"]["x"], 1);
        assert_eq!(event.kind(), "telemetry");
    }

    #[test]
    fn test_missing_type_tag_retained_as_unknown() {
        let event = SessionEvent::from_json_line(r#"{"data":42}"#).unwrap();
        assert_eq!(event.kind(), "unknown");
    }

    #[test]
    fn test_non_object_line_errors() {
        assert!(SessionEvent::from_json_line("not json").is_err());
        assert!(SessionEvent::from_json_line(r#"["array"]"#).is_err());
    }

    #[test]
    fn test_unknown_block_type_retained() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"image","source":"s3://x"}]}}"#;
        let event = SessionEvent::from_json_line(line).unwrap();

        let MessageContent::Blocks(blocks) = event.content().unwrap() else {
            panic!("expected blocks");
        };
        assert!(matches!(&blocks[0], ContentBlock::Other(raw) if raw["type"] == "image"));
    }

    #[test]
    fn test_text_joins_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"one"},{"type":"thinking","thinking":"hmm"},{"type":"text","text":"two"}]}}"#;
        let event = SessionEvent::from_json_line(line).unwrap();
        assert_eq!(event.content().unwrap().text().as_deref(), Some("one\ntwo"));
    }
}
