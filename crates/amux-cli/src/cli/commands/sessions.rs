//! Sessions command handlers.
//!
//! Read-only views over the backend's own session history files. `show` is
//! the reference consumer of the grouper and the tool dispatch table: it
//! prints normal messages with role prefixes, sub-agent spans indented under
//! their task line, and tool invocations as one-line summaries.

use std::path::PathBuf;

use amux_core::config::Config;
use amux_core::core::events::{ContentBlock, MessageContent, SessionEvent};
use amux_core::core::history;
use amux_deck::common::truncate_with_ellipsis;
use amux_deck::features::registry::ToolRegistry;
use amux_deck::features::transcript::{
    MessageGroup, SubagentDisplay, classify_subagent_child, group_messages,
};
use anyhow::{Context, Result};
use serde_json::Value;

const RESULT_PREVIEW_WIDTH: usize = 72;

pub fn list(project: &str, config: &Config) -> Result<()> {
    let project_path = resolve_project(project)?;
    let data_dir = config.backend.effective_data_dir();

    let sessions =
        history::list_sessions(&data_dir, &project_path).context("list sessions")?;
    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    for info in sessions {
        let modified = info
            .modified
            .map(history::format_timestamp)
            .unwrap_or_else(|| "unknown".to_string());
        let preview = info.preview.as_deref().unwrap_or("-");
        println!(
            "{}  {}  {:>4} events  {preview}",
            info.id, modified, info.event_count
        );
    }
    Ok(())
}

pub fn show(id: &str, project: &str, config: &Config) -> Result<()> {
    let project_path = resolve_project(project)?;
    let data_dir = config.backend.effective_data_dir();

    let events = history::load_session(&data_dir, &project_path, id)
        .with_context(|| format!("load session '{id}'"))?;
    if events.is_empty() {
        println!("Session '{id}' is empty.");
        return Ok(());
    }

    let registry = ToolRegistry::with_builtins();
    print!("{}", format_transcript(&events, &registry));
    Ok(())
}

fn resolve_project(project: &str) -> Result<PathBuf> {
    PathBuf::from(project)
        .canonicalize()
        .with_context(|| format!("resolve project directory '{project}'"))
}

// ===== Transcript formatting =====

/// Renders a grouped transcript. Sub-agent children are indented one level
/// under the assistant message that invoked their task, with the child
/// roles reclassified for display.
fn format_transcript(log: &[SessionEvent], registry: &ToolRegistry) -> String {
    let mut out = String::new();
    // Several spans can anchor on one message; print that message once.
    let mut last_task: Option<usize> = None;

    for group in group_messages(log) {
        match group {
            MessageGroup::Normal { index } => {
                format_event(&mut out, &log[index], "", registry);
            }
            MessageGroup::Subagent {
                task_index,
                children,
                ..
            } => {
                if last_task != Some(task_index) {
                    format_event(&mut out, &log[task_index], "", registry);
                    last_task = Some(task_index);
                }
                for child in children {
                    format_child(&mut out, &log[child], registry);
                }
            }
        }
    }
    out
}

fn format_child(out: &mut String, event: &SessionEvent, registry: &ToolRegistry) {
    match classify_subagent_child(event) {
        // The backend relays the child agent's output as user-typed
        // messages; display them as the sub-agent speaking.
        SubagentDisplay::Assistant => {
            if let Some(content) = event.content() {
                if let Some(text) = content.text() {
                    push_labeled(out, "  ", "assistant", &text);
                }
            }
        }
        SubagentDisplay::ToolResult => {
            if let Some(content) = event.content() {
                format_tool_results(out, "  ", content);
            }
        }
        SubagentDisplay::Verbatim => format_event(out, event, "  ", registry),
    }
}

fn format_event(out: &mut String, event: &SessionEvent, indent: &str, registry: &ToolRegistry) {
    match event {
        SessionEvent::Assistant(msg) => {
            if let Some(text) = msg.content.text() {
                push_labeled(out, indent, "assistant", &text);
            }
            if let MessageContent::Blocks(blocks) = &msg.content {
                for block in blocks {
                    if let ContentBlock::ToolUse { name, input, .. } = block {
                        out.push_str(indent);
                        out.push_str("  → ");
                        out.push_str(&registry.summarize(name, input));
                        out.push('\n');
                    }
                }
            }
        }
        SessionEvent::User(msg) => {
            if let Some(text) = msg.content.text() {
                push_labeled(out, indent, "user", &text);
            }
            format_tool_results(out, indent, &msg.content);
        }
        SessionEvent::System(sys) => {
            if let Some(subtype) = &sys.subtype {
                out.push_str(indent);
                out.push_str("system: ");
                out.push_str(subtype);
                if let Some(model) = &sys.model {
                    out.push_str(&format!(" ({model})"));
                }
                out.push('\n');
            }
        }
        SessionEvent::Result(res) => {
            let text = res.result.as_deref().unwrap_or("");
            let label = if res.is_error { "result (error)" } else { "result" };
            push_labeled(out, indent, label, text);
        }
        SessionEvent::Summary(sum) => {
            if let Some(summary) = &sum.summary {
                push_labeled(out, indent, "summary", summary);
            }
        }
        SessionEvent::Other(other) => {
            out.push_str(indent);
            out.push_str(&format!("[{}]\n", other.kind));
        }
    }
}

fn format_tool_results(out: &mut String, indent: &str, content: &MessageContent) {
    let MessageContent::Blocks(blocks) = content else {
        return;
    };
    for block in blocks {
        if let ContentBlock::ToolResult {
            content, is_error, ..
        } = block
        {
            out.push_str(indent);
            out.push_str(if *is_error { "  [result:error]" } else { "  [result]" });
            if let Some(preview) = tool_result_preview(content) {
                out.push(' ');
                out.push_str(&preview);
            }
            out.push('\n');
        }
    }
}

/// First line of a tool result, whether the backend sent a bare string or
/// an array of text blocks.
fn tool_result_preview(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(|item| {
            (item.get("type").and_then(Value::as_str) == Some("text"))
                .then(|| item.get("text").and_then(Value::as_str))
                .flatten()
        }),
        _ => None,
    }?;

    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return None;
    }
    Some(truncate_with_ellipsis(line, RESULT_PREVIEW_WIDTH))
}

/// Writes `label: text`, indenting continuation lines under the label.
fn push_labeled(out: &mut String, indent: &str, label: &str, text: &str) {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or("");
    out.push_str(indent);
    out.push_str(label);
    out.push_str(": ");
    out.push_str(first);
    out.push('\n');
    for line in lines {
        out.push_str(indent);
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> SessionEvent {
        SessionEvent::from_json_line(line).unwrap()
    }

    fn sample_log() -> Vec<SessionEvent> {
        vec![
            parse(r#"{"type":"user","message":{"content":"find the bug"}}"#),
            parse(
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Delegating."},{"type":"tool_use","id":"t1","name":"Task","input":{"description":"scan the crate"}}]}}"#,
            ),
            parse(
                r#"{"type":"user","message":{"content":[{"type":"text","text":"Scanning now"}]},"parentToolUseId":"t1","isSidechain":true}"#,
            ),
            parse(
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"b1","name":"Bash","input":{"command":"cargo tree"}}]},"parentToolUseId":"t1","isSidechain":true}"#,
            ),
            parse(r#"{"type":"result","result":"Found it."}"#),
        ]
    }

    #[test]
    fn test_transcript_indents_subagent_span() {
        let registry = ToolRegistry::with_builtins();
        let transcript = format_transcript(&sample_log(), &registry);

        let expected = "\
user: find the bug
assistant: Delegating.
  → task scan the crate
  assistant: Scanning now
    → bash cargo tree
result: Found it.
";
        assert_eq!(transcript, expected);
    }

    #[test]
    fn test_transcript_reclassifies_child_tool_result() {
        let registry = ToolRegistry::with_builtins();
        let log = vec![
            parse(
                r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Task","input":{"description":"probe"}}]}}"#,
            ),
            parse(
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"b1","content":"line one\nline two"}]},"parentToolUseId":"t1","isSidechain":true}"#,
            ),
        ];

        let transcript = format_transcript(&log, &registry);
        assert!(transcript.contains("  [result] line one"));
        assert!(!transcript.contains("line two"));
    }

    #[test]
    fn test_transcript_marks_error_results() {
        let registry = ToolRegistry::with_builtins();
        let log = vec![parse(
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"b1","content":"boom","is_error":true}]}}"#,
        )];

        let transcript = format_transcript(&log, &registry);
        assert!(transcript.contains("[result:error] boom"));
    }

    #[test]
    fn test_transcript_keeps_unknown_events_opaque() {
        let registry = ToolRegistry::with_builtins();
        let log = vec![parse(r#"{"type":"control_response","payload":{}}"#)];

        let transcript = format_transcript(&log, &registry);
        assert_eq!(transcript, "[control_response]\n");
    }

    #[test]
    fn test_unregistered_tool_falls_back_to_name() {
        let registry = ToolRegistry::with_builtins();
        let log = vec![parse(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"x1","name":"Sparkle","input":{}}]}}"#,
        )];

        let transcript = format_transcript(&log, &registry);
        assert!(transcript.contains("→ Sparkle"));
    }

    #[test]
    fn test_tool_result_preview_handles_block_array() {
        let content: Value =
            serde_json::from_str(r#"[{"type":"text","text":"first\nrest"}]"#).unwrap();
        assert_eq!(tool_result_preview(&content).as_deref(), Some("first"));

        assert_eq!(tool_result_preview(&Value::Null), None);
    }
}
