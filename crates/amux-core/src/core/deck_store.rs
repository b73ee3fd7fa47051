//! Persistence for the tab deck.
//!
//! The open-tab list survives restarts as a small JSON file under the amux
//! home directory. Load is tolerant (missing or corrupt files yield an empty
//! deck), save is atomic via a temp file rename.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One persisted tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
}

/// Loads the persisted deck, or an empty one when absent.
///
/// A corrupt file is logged and treated as empty rather than refusing to
/// start.
pub fn load(path: &Path) -> Vec<TabRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(target: "amux::deck_store", "Failed to read {}: {e}", path.display());
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(
                target: "amux::deck_store",
                "Ignoring corrupt deck file {}: {e}",
                path.display()
            );
            Vec::new()
        }
    }
}

/// Saves the deck atomically.
pub fn save(path: &Path, records: &[TabRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize deck")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write deck file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move deck file to {}", path.display()))?;

    Ok(())
}
