//! Tabs command handlers (the saved deck at rest).

use std::io;

use amux_core::config;
use amux_core::core::deck_store;
use anyhow::{Context, Result};

pub fn list() -> Result<()> {
    let deck_path = config::paths::deck_path();
    let records = deck_store::load(&deck_path);
    if records.is_empty() {
        println!("No saved tabs.");
        return Ok(());
    }

    for (position, record) in records.iter().enumerate() {
        let session = record.session_id.as_deref().unwrap_or("-");
        let project = record
            .project_path
            .as_deref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string());
        println!("{position:>2}  {}  idle  {session}  {project}", record.title);
    }
    Ok(())
}

pub fn clear() -> Result<()> {
    let deck_path = config::paths::deck_path();
    match std::fs::remove_file(&deck_path) {
        Ok(()) => {
            println!("Cleared saved tabs.");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            println!("No saved tabs.");
            Ok(())
        }
        Err(err) => {
            Err(err).with_context(|| format!("remove deck file {}", deck_path.display()))
        }
    }
}
