//! Headless session deck for amux.
//!
//! Elm-style core: pure `update()` over [`state::DeckState`] producing
//! [`effects::DeckEffect`]s, executed by [`runtime::DeckRuntime`]. Frontends
//! drive the deck through a [`runtime::DeckHandle`] and observe it through
//! notification subscriptions.

pub mod common;
pub mod effects;
pub mod events;
pub mod features;
pub mod mutations;
pub mod runtime;
pub mod state;
pub mod update;

pub use features::{registry, tabs, transcript};
pub use runtime::{DeckHandle, DeckRuntime};
