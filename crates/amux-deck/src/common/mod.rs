//! Shared helpers for the deck crate.

pub mod text;

pub use text::{single_line, truncate_with_ellipsis};
