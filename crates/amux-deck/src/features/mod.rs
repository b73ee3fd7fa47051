//! Feature slices for the deck (state/update per slice).

pub mod registry;
pub mod tabs;
pub mod transcript;
