//! State mutations: the only way deck state changes.
//!
//! Event handlers return mutations instead of touching state directly, so
//! every transition funnels through [`crate::features::tabs::TabsState::apply`]
//! and stays replayable in tests.

use std::path::PathBuf;

use amux_core::core::events::SessionEvent;

use crate::features::tabs::TabId;

#[derive(Debug)]
pub enum TabsMutation {
    /// Appends a tab at the end of the deck and activates it.
    Create {
        id: TabId,
        title: String,
        session_id: Option<String>,
        project_path: Option<PathBuf>,
    },
    Activate {
        id: TabId,
    },
    Remove {
        id: TabId,
    },
    /// Reorders by position; activation is untouched.
    Move {
        from: usize,
        to: usize,
    },
    /// Streaming transition, optionally carrying a session id to attach.
    /// Ignored while the tab is in the terminal error state.
    SetStreaming {
        id: TabId,
        streaming: bool,
        session_id: Option<String>,
    },
    /// Attaches a session id if the tab does not have one yet.
    AttachSession {
        id: TabId,
        session_id: String,
    },
    MarkError {
        id: TabId,
        message: String,
    },
    SetDraft {
        id: TabId,
        draft: String,
    },
    /// Appends a stream event to the tab's log; stale sequence numbers are
    /// dropped by the log itself.
    AppendEvent {
        id: TabId,
        seq: u64,
        event: SessionEvent,
    },
}
