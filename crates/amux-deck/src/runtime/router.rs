//! Session stream router.
//!
//! Bridges per-tab backend streams into the deck inbox. Each open
//! subscription runs one forwarder task that stamps sequence numbers and
//! sends `DeckEvent::Session` traffic; cancelling the subscription stops
//! forwarding without touching the process, and termination cancels the
//! process token handed over by [`SessionProcess::split`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use amux_core::core::process::{ProcessEvent, SessionProcess};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::{DeckEvent, SessionUpdate};
use crate::features::tabs::TabId;

struct TabRoute {
    sub_cancel: CancellationToken,
    proc_cancel: CancellationToken,
    /// Sequence counter, carried across turns on the same tab so stamps
    /// stay above the tab log's high-water mark.
    seq: Arc<AtomicU64>,
}

#[derive(Default)]
pub struct StreamRouter {
    routes: HashMap<TabId, TabRoute>,
}

impl StreamRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a subscription for a tab's backend process. A still-open route
    /// for the same tab is cancelled and replaced; its sequence counter
    /// carries over.
    pub fn open(
        &mut self,
        tab_id: TabId,
        process: SessionProcess,
        inbox_tx: mpsc::UnboundedSender<DeckEvent>,
    ) {
        let seq = match self.routes.remove(&tab_id) {
            Some(old) => {
                tracing::debug!(target: "amux::router", "Replacing open route for tab {tab_id}");
                old.sub_cancel.cancel();
                old.proc_cancel.cancel();
                old.seq
            }
            None => Arc::new(AtomicU64::new(0)),
        };

        let (events, proc_cancel) = process.split();
        let sub_cancel = CancellationToken::new();
        self.routes.insert(
            tab_id,
            TabRoute {
                sub_cancel: sub_cancel.clone(),
                proc_cancel,
                seq: Arc::clone(&seq),
            },
        );

        tokio::spawn(forward_stream(tab_id, events, seq, sub_cancel, inbox_tx));
    }

    /// Stops forwarding for a tab. The backend process keeps running until
    /// [`StreamRouter::terminate`] is called.
    pub fn cancel_subscription(&mut self, tab_id: TabId) {
        if let Some(route) = self.routes.get(&tab_id) {
            route.sub_cancel.cancel();
        }
    }

    /// Kills the tab's backend process and forgets the route.
    pub fn terminate(&mut self, tab_id: TabId) {
        if let Some(route) = self.routes.remove(&tab_id) {
            route.sub_cancel.cancel();
            route.proc_cancel.cancel();
        }
    }

    pub fn close_all(&mut self) {
        for (_, route) in self.routes.drain() {
            route.sub_cancel.cancel();
            route.proc_cancel.cancel();
        }
    }

    #[cfg(test)]
    fn is_open(&self, tab_id: TabId) -> bool {
        self.routes.contains_key(&tab_id)
    }
}

impl Drop for StreamRouter {
    fn drop(&mut self) {
        self.close_all();
    }
}

async fn forward_stream(
    tab_id: TabId,
    mut events: mpsc::Receiver<ProcessEvent>,
    seq: Arc<AtomicU64>,
    sub_cancel: CancellationToken,
    inbox_tx: mpsc::UnboundedSender<DeckEvent>,
) {
    loop {
        let event = tokio::select! {
            () = sub_cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let update = match event {
            ProcessEvent::Status(status) => SessionUpdate::Status(status),
            ProcessEvent::Message(message) => SessionUpdate::Event(message),
        };
        let seq = seq.fetch_add(1, Ordering::Relaxed) + 1;
        if inbox_tx
            .send(DeckEvent::Session {
                tab_id,
                seq,
                update,
            })
            .is_err()
        {
            // Deck inbox is gone; nothing left to forward to.
            break;
        }
    }
    tracing::debug!(target: "amux::router", "Subscription for tab {tab_id} ended");
}
