//! Central update dispatcher.
//!
//! `update()` is the single entry point for deck events: it routes each
//! event to its feature handler, applies the returned mutations, and hands
//! the effects back to the runtime. Handlers stay pure, so the whole
//! command surface is testable without a runtime.

use crate::effects::{DeckEffect, DeckNotification};
use crate::events::DeckEvent;
use crate::features::tabs;
use crate::mutations::TabsMutation;
use crate::state::{DeckPhase, DeckState};

pub fn update(state: &mut DeckState, event: DeckEvent) -> Vec<DeckEffect> {
    match event {
        DeckEvent::Bootstrap { records } => {
            if state.phase != DeckPhase::Uninitialized {
                tracing::warn!(target: "amux::deck", "Ignoring repeated bootstrap");
                return Vec::new();
            }
            state.tabs.restore(records);
            state.phase = DeckPhase::Ready;
            vec![DeckEffect::Notify(DeckNotification::ActiveTabChanged {
                tab_id: state.tabs.active_id(),
            })]
        }

        DeckEvent::Command(command) => {
            if state.phase != DeckPhase::Ready {
                tracing::warn!(target: "amux::deck", "Dropping command before bootstrap");
                return Vec::new();
            }
            let active_before = state.tabs.active_id();
            let (mut effects, mutations) = tabs::update::handle_command(&state.tabs, command);
            apply_mutations(state, mutations);
            if state.tabs.active_id() != active_before {
                effects.push(DeckEffect::Notify(DeckNotification::ActiveTabChanged {
                    tab_id: state.tabs.active_id(),
                }));
            }
            effects
        }

        DeckEvent::Session {
            tab_id,
            seq,
            update,
        } => {
            if state.phase != DeckPhase::Ready {
                tracing::warn!(target: "amux::deck", "Dropping stream traffic before bootstrap");
                return Vec::new();
            }
            let active_before = state.tabs.active_id();
            let (mut effects, mutations) =
                tabs::update::handle_session(&state.tabs, tab_id, seq, update);
            apply_mutations(state, mutations);
            if state.tabs.active_id() != active_before {
                effects.push(DeckEffect::Notify(DeckNotification::ActiveTabChanged {
                    tab_id: state.tabs.active_id(),
                }));
            }
            effects
        }

        DeckEvent::Shutdown => vec![DeckEffect::Quit],
    }
}

fn apply_mutations(state: &mut DeckState, mutations: Vec<TabsMutation>) {
    for mutation in mutations {
        state.tabs.apply(mutation);
    }
}
