//! Core amux library (backend protocol, session process, config).

pub mod config;
pub mod core;
