//! Core module: UI-agnostic domain and runtime.
//!
//! This module contains:
//! - `events`: Backend stream event types and parsing
//! - `process`: Spawning and supervising one backend turn
//! - `history`: Read-only access to the backend's session logs
//! - `deck_store`: Persistence for the tab deck
//! - `interrupt`: Signal handling for graceful interruption

pub mod deck_store;
pub mod events;
pub mod history;
pub mod interrupt;
pub mod process;
