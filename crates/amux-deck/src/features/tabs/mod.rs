//! Tab deck slice (state/update).

pub mod state;
pub mod update;

pub use state::{derive_title, MessageLog, Tab, TabId, TabStatus, TabsState, UNTITLED};
