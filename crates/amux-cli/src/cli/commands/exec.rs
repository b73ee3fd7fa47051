//! Exec command handler.
//!
//! One-shot execution: boots a fresh deck (nothing restored), opens one tab
//! with the prompt, streams assistant text to stdout, and exits with the
//! tab's final status. Ctrl+C terminates the backend and exits 130.

use std::path::PathBuf;

use amux_core::config::Config;
use amux_core::core::events::SessionEvent;
use amux_core::core::interrupt;
use amux_deck::effects::DeckNotification;
use amux_deck::events::{DeckCommand, DeckEvent};
use amux_deck::features::tabs::TabStatus;
use amux_deck::runtime::DeckRuntime;
use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;

pub struct ExecRunOptions<'a> {
    pub prompt: &'a str,
    pub project: &'a str,
    pub resume: Option<&'a str>,
    pub model_override: Option<&'a str>,
    pub config: &'a Config,
}

pub async fn run(options: ExecRunOptions<'_>) -> Result<()> {
    let project_path = PathBuf::from(options.project)
        .canonicalize()
        .with_context(|| format!("resolve project directory '{}'", options.project))?;

    // Apply overrides if provided
    let config = {
        let mut c = options.config.clone();
        if let Some(model) = options.model_override {
            c.model = Some(model.to_string());
        }
        c
    };

    // One-shot decks never restore saved tabs and must not clobber them
    // either; persistence goes to a scratch file.
    let deck_path = scratch_deck_path();

    let mut runtime = DeckRuntime::new(config, deck_path.clone());
    let mut notifications = runtime.subscribe();
    let handle = runtime.handle();
    let worker = tokio::spawn(runtime.run());

    handle.send(DeckEvent::Bootstrap {
        records: Vec::new(),
    })?;
    handle.command(DeckCommand::NewTab {
        title: None,
        session_id: options.resume.map(str::to_string),
        project_path: Some(project_path),
        prompt: Some(options.prompt.to_string()),
    })?;

    let outcome = stream_transcript(&mut notifications).await;

    // Winds the runtime down; dropping it kills any live backend process.
    let _ = handle.shutdown();
    let _ = worker.await;
    let _ = std::fs::remove_file(&deck_path);

    outcome
}

/// Follows deck notifications until the tab settles.
async fn stream_transcript(notifications: &mut mpsc::Receiver<DeckNotification>) -> Result<()> {
    loop {
        let notification = tokio::select! {
            () = interrupt::wait_for_interrupt() => {
                return Err(interrupt::InterruptedError.into());
            }
            notification = notifications.recv() => notification,
        };
        let Some(notification) = notification else {
            bail!("Deck runtime stopped unexpectedly");
        };

        match notification {
            DeckNotification::EventAppended { event, .. } => print_event(&event),
            DeckNotification::TabStatusChanged { status, .. } => match status {
                TabStatus::Idle => return Ok(()),
                TabStatus::Error { message } => bail!("Session failed: {message}"),
                TabStatus::Streaming => {}
            },
            _ => {}
        }
    }
}

/// Prints top-level assistant text as it arrives. Sub-agent traffic stays
/// quiet, and the closing result line goes to stderr so stdout carries only
/// the response.
fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Assistant(message) => {
            if message.parent_tool_use_id.is_none() && !message.is_sidechain {
                if let Some(text) = message.content.text() {
                    println!("{text}");
                }
            }
        }
        SessionEvent::Result(result) => {
            let mut parts = Vec::new();
            if let Some(ms) = result.duration_ms {
                parts.push(format!("{:.1}s", ms as f64 / 1000.0));
            }
            if let Some(cost) = result.total_cost_usd {
                parts.push(format!("${cost:.4}"));
            }
            if result.is_error {
                parts.push("error".to_string());
            }
            if !parts.is_empty() {
                eprintln!("({})", parts.join(", "));
            }
        }
        _ => {}
    }
}

fn scratch_deck_path() -> PathBuf {
    std::env::temp_dir().join(format!("amux-exec-{}.json", std::process::id()))
}
