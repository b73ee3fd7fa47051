//! Deck runtime - owns the inbox, runs the event loop, executes effects.
//!
//! This is the "Elm runtime" boundary: all side effects happen here.
//! The reducer stays pure and produces effects; this module executes them.
//!
//! ## Inbox Pattern
//!
//! All deck traffic funnels through one unbounded channel:
//! - Callers send commands through a [`DeckHandle`]
//! - The stream router forwards per-tab session traffic as
//!   `DeckEvent::Session`
//! - The runtime drains the inbox in one loop, so every state mutation is
//!   serialized through a single task

mod router;

use std::path::PathBuf;

use amux_core::config::Config;
use amux_core::core::deck_store;
use amux_core::core::process::{self, ProcessStatus, TurnOptions};
use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::effects::{DeckEffect, DeckNotification};
use crate::events::{DeckCommand, DeckEvent, SessionUpdate};
use crate::features::tabs::TabId;
use crate::state::DeckState;
use crate::update;
use router::StreamRouter;

/// Capacity of each subscriber's notification channel.
const NOTIFY_CHANNEL_CAPACITY: usize = 256;

/// Cloneable sender for feeding events into a running deck.
#[derive(Debug, Clone)]
pub struct DeckHandle {
    inbox_tx: mpsc::UnboundedSender<DeckEvent>,
}

impl DeckHandle {
    pub fn send(&self, event: DeckEvent) -> Result<()> {
        self.inbox_tx
            .send(event)
            .ok()
            .context("Deck runtime is not running")
    }

    pub fn command(&self, command: DeckCommand) -> Result<()> {
        self.send(DeckEvent::Command(command))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(DeckEvent::Shutdown)
    }
}

/// Headless deck runtime.
///
/// Owns the state and the stream router. Runs the event loop and executes
/// effects; open subscriptions are cancelled on drop.
pub struct DeckRuntime {
    config: Config,
    /// Deck file rewritten on every persist effect.
    deck_path: PathBuf,
    state: DeckState,
    inbox_tx: mpsc::UnboundedSender<DeckEvent>,
    inbox_rx: mpsc::UnboundedReceiver<DeckEvent>,
    subscribers: Vec<mpsc::Sender<DeckNotification>>,
    router: StreamRouter,
    should_quit: bool,
}

impl DeckRuntime {
    pub fn new(config: Config, deck_path: PathBuf) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            config,
            deck_path,
            state: DeckState::new(),
            inbox_tx,
            inbox_rx,
            subscribers: Vec::new(),
            router: StreamRouter::new(),
            should_quit: false,
        }
    }

    pub fn handle(&self) -> DeckHandle {
        DeckHandle {
            inbox_tx: self.inbox_tx.clone(),
        }
    }

    /// Registers a notification subscriber. Must be called before
    /// [`DeckRuntime::run`] consumes the runtime.
    pub fn subscribe(&mut self) -> mpsc::Receiver<DeckNotification> {
        let (tx, rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> &DeckState {
        &self.state
    }

    /// Runs the event loop until a shutdown event arrives.
    pub async fn run(mut self) -> Result<()> {
        while !self.should_quit {
            let Some(event) = self.inbox_rx.recv().await else {
                break;
            };
            let effects = update::update(&mut self.state, event);
            self.execute_effects(effects);
        }
        Ok(())
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    /// Executes effects returned by the reducer.
    fn execute_effects(&mut self, effects: Vec<DeckEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: DeckEffect) {
        match effect {
            DeckEffect::PersistTabs => {
                let records = self.state.tabs.records();
                if let Err(err) = deck_store::save(&self.deck_path, &records) {
                    tracing::warn!(target: "amux::deck", "Failed to persist tabs: {err:#}");
                }
            }
            DeckEffect::SpawnSession {
                tab_id,
                project_path,
                prompt,
                resume,
            } => self.spawn_session(tab_id, project_path, prompt, resume),
            DeckEffect::CancelSubscription { tab_id } => self.router.cancel_subscription(tab_id),
            DeckEffect::TerminateSession { tab_id } => self.router.terminate(tab_id),
            DeckEffect::Notify(notification) => self.notify(notification),
            DeckEffect::Quit => {
                self.should_quit = true;
            }
        }
    }

    fn spawn_session(
        &mut self,
        tab_id: TabId,
        project_path: PathBuf,
        prompt: String,
        resume: Option<String>,
    ) {
        let options = TurnOptions {
            project_path,
            prompt,
            resume,
            model: self.config.effective_model().map(str::to_string),
            timeout: self.config.backend.turn_timeout(),
        };
        match process::spawn_session(&self.config.backend, options) {
            Ok(session) => self.router.open(tab_id, session, self.inbox_tx.clone()),
            Err(err) => {
                tracing::error!(target: "amux::deck", "Failed to start session: {err:#}");
                // Feed the failure back through the reducer so the tab
                // transitions like any other stream error.
                let _ = self.inbox_tx.send(DeckEvent::Session {
                    tab_id,
                    seq: 0,
                    update: SessionUpdate::Status(ProcessStatus::Failed {
                        message: format!("{err:#}"),
                    }),
                });
            }
        }
    }

    fn notify(&mut self, notification: DeckNotification) {
        self.subscribers.retain(|tx| {
            match tx.try_send(notification.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Keep the subscriber; it only misses this one.
                    tracing::warn!(
                        target: "amux::deck",
                        "Dropping notification for slow subscriber"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}
