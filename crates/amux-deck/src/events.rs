//! Deck events: everything that can reach the update loop.
//!
//! Events come from three places: the runtime bootstrapping persisted tabs,
//! callers issuing commands through a [`crate::runtime::DeckHandle`], and the
//! stream router forwarding per-tab session traffic.

use std::path::PathBuf;

use amux_core::core::deck_store::TabRecord;
use amux_core::core::events::SessionEvent;
use amux_core::core::process::ProcessStatus;

use crate::features::tabs::TabId;

#[derive(Debug)]
pub enum DeckEvent {
    /// Seeds the deck with persisted tabs. Accepted once, before anything
    /// else; an empty record list starts a fresh deck.
    Bootstrap { records: Vec<TabRecord> },
    /// A caller-issued deck operation.
    Command(DeckCommand),
    /// Traffic forwarded by the stream router for one tab. `seq` is the
    /// per-subscription sequence number used for duplicate suppression.
    Session {
        tab_id: TabId,
        seq: u64,
        update: SessionUpdate,
    },
    Shutdown,
}

#[derive(Debug)]
pub enum DeckCommand {
    NewTab {
        title: Option<String>,
        session_id: Option<String>,
        project_path: Option<PathBuf>,
        /// When present, a session turn is started as soon as the tab exists.
        prompt: Option<String>,
    },
    SwitchTab {
        id: TabId,
    },
    CloseTab {
        id: TabId,
        /// Skips the unsaved-changes confirmation.
        force: bool,
    },
    MoveTab {
        from: usize,
        to: usize,
    },
    SetDraft {
        id: TabId,
        draft: String,
    },
    /// Sends a prompt on an existing tab, resuming its session if one is
    /// attached.
    SendPrompt {
        id: TabId,
        prompt: String,
    },
}

/// One unit of session traffic, as surfaced by the router.
#[derive(Debug)]
pub enum SessionUpdate {
    Status(ProcessStatus),
    Event(SessionEvent),
}
