//! Read-only access to the backend's persisted session logs.
//!
//! The backend stores one JSONL file per session under
//! `<data_dir>/projects/<slug>/`, where `<slug>` encodes the project path
//! (every path separator becomes `-`). amux never writes these files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use crate::core::events::SessionEvent;

const PREVIEW_MAX_CHARS: usize = 80;

/// Summary of one persisted session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Utc>>,
    /// First top-level user prompt, for list display.
    pub preview: Option<String>,
    pub event_count: usize,
}

/// Encodes a project path the way the backend names its log directories.
pub fn project_slug(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if let Some(rest) = normalized.strip_prefix('/') {
        format!("-{}", rest.replace('/', "-"))
    } else {
        normalized.replace('/', "-")
    }
}

/// Directory holding the given project's session logs.
pub fn project_sessions_dir(data_dir: &Path, project_path: &Path) -> PathBuf {
    data_dir.join("projects").join(project_slug(project_path))
}

/// Lists persisted sessions of a project, most recently modified first.
///
/// Returns an empty list when the backend has no directory for the project.
pub fn list_sessions(data_dir: &Path, project_path: &Path) -> Result<Vec<SessionInfo>> {
    let dir = project_sessions_dir(data_dir, project_path);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&dir)
        .with_context(|| format!("Failed to read sessions directory {}", dir.display()))?;

    let mut sessions = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read sessions directory entry")?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(ToString::to_string)
        else {
            continue;
        };

        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        let (preview, event_count) = peek_session(&path);

        sessions.push(SessionInfo {
            id,
            path,
            modified,
            preview,
            event_count,
        });
    }

    sessions.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(sessions)
}

/// Loads a session's full event log.
///
/// Malformed lines are counted and logged, not fatal.
pub fn load_session(
    data_dir: &Path,
    project_path: &Path,
    session_id: &str,
) -> Result<Vec<SessionEvent>> {
    let dir = project_sessions_dir(data_dir, project_path);
    let path = dir.join(format!("{session_id}.jsonl"));
    if !path.exists() {
        bail!("Session '{session_id}' not found under {}", dir.display());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read session log {}", path.display()))?;

    let mut events = Vec::new();
    let mut skipped = 0usize;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match SessionEvent::from_json_line(line) {
            Ok(event) => events.push(event),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            target: "amux::history",
            "Skipped {skipped} malformed line(s) in session '{session_id}'"
        );
    }

    Ok(events)
}

/// Formats a history timestamp for list display.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// First prompt preview and line count, without failing on bad files.
fn peek_session(path: &Path) -> (Option<String>, usize) {
    let Ok(content) = fs::read_to_string(path) else {
        return (None, 0);
    };

    let mut preview = None;
    let mut count = 0usize;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;
        if preview.is_some() {
            continue;
        }
        if let Ok(SessionEvent::User(msg)) = SessionEvent::from_json_line(line) {
            // Sub-agent traffic and tool results are not the opening prompt.
            if msg.parent_tool_use_id.is_none() && !msg.is_sidechain {
                if let Some(text) = msg.content.text() {
                    preview = Some(preview_text(&text));
                }
            }
        }
    }
    (preview, count)
}

fn preview_text(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    first_line.chars().take(PREVIEW_MAX_CHARS).collect()
}
