//! Top-level deck state.

use crate::features::tabs::TabsState;

/// Deck lifecycle. Commands and stream traffic are only honored once the
/// persisted tabs have been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckPhase {
    Uninitialized,
    Ready,
}

#[derive(Debug)]
pub struct DeckState {
    pub phase: DeckPhase,
    pub tabs: TabsState,
}

impl DeckState {
    pub fn new() -> Self {
        Self {
            phase: DeckPhase::Uninitialized,
            tabs: TabsState::new(),
        }
    }
}

impl Default for DeckState {
    fn default() -> Self {
        Self::new()
    }
}
