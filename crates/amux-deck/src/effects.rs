//! Deck effects: side effects requested by the update loop.
//!
//! `update()` itself never performs IO; it returns effects and the runtime
//! executes them after the mutations have been applied.

use std::path::PathBuf;

use amux_core::core::events::SessionEvent;

use crate::features::tabs::{TabId, TabStatus};

#[derive(Debug)]
pub enum DeckEffect {
    /// Writes the current tab records to the deck file.
    PersistTabs,
    /// Starts a session turn for a tab and routes its stream back into the
    /// deck as `DeckEvent::Session` traffic.
    SpawnSession {
        tab_id: TabId,
        project_path: PathBuf,
        prompt: String,
        resume: Option<String>,
    },
    /// Stops forwarding stream traffic for a tab.
    CancelSubscription { tab_id: TabId },
    /// Terminates the tab's backend process, if one is running.
    TerminateSession { tab_id: TabId },
    /// Fans a notification out to subscribers.
    Notify(DeckNotification),
    Quit,
}

/// Outbound notifications for deck observers (CLI frontends, tests).
#[derive(Debug, Clone)]
pub enum DeckNotification {
    TabCreated {
        tab_id: TabId,
    },
    TabClosed {
        tab_id: TabId,
    },
    ActiveTabChanged {
        tab_id: Option<TabId>,
    },
    TabStatusChanged {
        tab_id: TabId,
        status: TabStatus,
    },
    /// Close was refused because the tab has unsaved changes; retry with
    /// force to discard them.
    CloseNeedsConfirmation {
        tab_id: TabId,
    },
    /// A stream event was accepted into the tab's log.
    EventAppended {
        tab_id: TabId,
        event: SessionEvent,
    },
}
