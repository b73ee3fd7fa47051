//! Sub-agent grouping over a session message log.
//!
//! A pure projection from an append-only log to display groups: runs of
//! messages spawned by a `task` tool invocation collapse into one
//! [`MessageGroup::Subagent`], everything else stays
//! [`MessageGroup::Normal`]. Identical logs produce identical groupings.

use amux_core::core::events::{ContentBlock, MessageContent, SessionEvent};

/// Tool name that opens a sub-agent span (compared case-insensitively).
pub const TASK_TOOL: &str = "task";

/// One display group over the log.
///
/// Indices refer to positions in the grouped log. Groups preserve log order
/// and partition the indices: a child index appears in exactly one
/// `Subagent` group and is not re-emitted as `Normal`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageGroup {
    Normal {
        index: usize,
    },
    Subagent {
        /// Index of the assistant message holding the `task` invocation.
        task_index: usize,
        /// Id of the `task` tool-use block that opened the span.
        tool_use_id: String,
        /// Indices of the messages collected into the span, in log order.
        children: Vec<usize>,
        start: usize,
        end: usize,
    },
}

impl MessageGroup {
    /// Log position the group starts at, for ordering.
    pub fn start_index(&self) -> usize {
        match self {
            MessageGroup::Normal { index } => *index,
            MessageGroup::Subagent { start, .. } => *start,
        }
    }
}

/// How a message inside a sub-agent span is displayed.
///
/// The backend relays the child agent's output as `user`-typed messages, so
/// a user child carrying text is really the sub-agent speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubagentDisplay {
    /// Prompt-to-child traffic shown as sub-agent assistant output.
    Assistant,
    /// Tool-result-to-child traffic.
    ToolResult,
    /// Everything else keeps its own role.
    Verbatim,
}

/// Groups a message log into normal messages and sub-agent spans.
///
/// 1. Every assistant content block invoking the `task` tool is a boundary.
/// 2. Each boundary collects the following messages whose
///    `parent_tool_use_id` matches its tool-use id, stopping at the first
///    message that itself contains a new `task` invocation.
/// 3. A boundary with at least one child emits `Subagent` and consumes its
///    children; a boundary with none stays `Normal`.
pub fn group_messages(log: &[SessionEvent]) -> Vec<MessageGroup> {
    let boundaries = find_boundaries(log);

    let mut consumed = vec![false; log.len()];
    let mut spans: Vec<(usize, String, Vec<usize>)> = Vec::new();
    for (task_index, tool_use_id) in boundaries {
        let mut children = Vec::new();
        for (j, event) in log.iter().enumerate().skip(task_index + 1) {
            if has_task_invocation(event) {
                break;
            }
            if consumed[j] {
                continue;
            }
            if event.parent_tool_use_id() == Some(tool_use_id.as_str()) {
                children.push(j);
            }
        }
        if children.is_empty() {
            continue;
        }
        for &j in &children {
            consumed[j] = true;
        }
        spans.push((task_index, tool_use_id, children));
    }

    // Spans are ordered by task index already; emit them at their boundary
    // position and everything unconsumed as Normal.
    let mut groups = Vec::new();
    let mut spans = spans.into_iter().peekable();
    for index in 0..log.len() {
        let mut emitted_span = false;
        while spans.peek().is_some_and(|(task_index, ..)| *task_index == index) {
            let Some((task_index, tool_use_id, children)) = spans.next() else {
                break;
            };
            let end = children.last().copied().unwrap_or(task_index);
            groups.push(MessageGroup::Subagent {
                task_index,
                tool_use_id,
                children,
                start: task_index,
                end,
            });
            emitted_span = true;
        }
        if !emitted_span && !consumed[index] {
            groups.push(MessageGroup::Normal { index });
        }
    }
    groups
}

/// True when a `Subagent` group with this tool-use id exists.
///
/// Filters that hide sub-agent children by `parent_tool_use_id` must check
/// this first; a child whose parent never formed a group stays visible.
pub fn subagent_group_exists(groups: &[MessageGroup], tool_use_id: &str) -> bool {
    groups
        .iter()
        .any(|g| matches!(g, MessageGroup::Subagent { tool_use_id: id, .. } if id == tool_use_id))
}

/// Classifies a span child for display.
pub fn classify_subagent_child(event: &SessionEvent) -> SubagentDisplay {
    match event {
        SessionEvent::User(msg) if msg.content.has_text() => SubagentDisplay::Assistant,
        SessionEvent::User(msg) if msg.content.has_tool_result() => SubagentDisplay::ToolResult,
        _ => SubagentDisplay::Verbatim,
    }
}

fn find_boundaries(log: &[SessionEvent]) -> Vec<(usize, String)> {
    let mut boundaries = Vec::new();
    for (index, event) in log.iter().enumerate() {
        let SessionEvent::Assistant(msg) = event else {
            continue;
        };
        let MessageContent::Blocks(blocks) = &msg.content else {
            continue;
        };
        for block in blocks {
            if let ContentBlock::ToolUse { id, name, .. } = block {
                if name.eq_ignore_ascii_case(TASK_TOOL) {
                    boundaries.push((index, id.clone()));
                }
            }
        }
    }
    boundaries
}

fn has_task_invocation(event: &SessionEvent) -> bool {
    let Some(MessageContent::Blocks(blocks)) = event.content() else {
        return false;
    };
    matches!(event, SessionEvent::Assistant(_))
        && blocks.iter().any(|block| {
            matches!(block, ContentBlock::ToolUse { name, .. } if name.eq_ignore_ascii_case(TASK_TOOL))
        })
}
