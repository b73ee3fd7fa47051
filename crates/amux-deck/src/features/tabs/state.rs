//! Tab store: the ordered tab list and the active-tab designation.
//!
//! All mutations go through [`TabsState::apply`]; the store upholds the
//! activation invariant (at most one active tab, exactly one while the deck
//! is non-empty) across every mutation.

use std::fmt;
use std::path::{Path, PathBuf};

use amux_core::core::deck_store::TabRecord;
use amux_core::core::events::SessionEvent;
use uuid::Uuid;

use crate::mutations::TabsMutation;

/// Stable tab identity; assigned at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TabId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tab lifecycle state. `Error` is terminal: streaming transitions no
/// longer apply, only closing the tab disposes of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabStatus {
    Idle,
    Streaming,
    Error { message: String },
}

impl TabStatus {
    pub fn is_streaming(&self) -> bool {
        matches!(self, TabStatus::Streaming)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TabStatus::Error { .. })
    }
}

impl fmt::Display for TabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabStatus::Idle => write!(f, "idle"),
            TabStatus::Streaming => write!(f, "streaming"),
            TabStatus::Error { .. } => write!(f, "error"),
        }
    }
}

/// Append-only message log with duplicate suppression.
///
/// The stream router stamps every forwarded event with a per-subscription
/// monotonic sequence number; the log keeps the high-water mark and drops
/// anything stale or repeated.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<SessionEvent>,
    last_seq: u64,
}

impl MessageLog {
    /// Appends an event. Returns false when the sequence number is not
    /// newer than the high-water mark.
    pub fn append(&mut self, seq: u64, event: SessionEvent) -> bool {
        if seq <= self.last_seq {
            tracing::debug!(
                target: "amux::tabs",
                "Dropping repeated stream event (seq {seq}, high-water {})",
                self.last_seq
            );
            return false;
        }
        self.last_seq = seq;
        self.entries.push(event);
        true
    }

    pub fn events(&self) -> &[SessionEvent] {
        &self.entries
    }

    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One tab: an independent session with its own message log and lifecycle.
#[derive(Debug)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    /// Backend session id, attached the first time one becomes known.
    pub session_id: Option<String>,
    pub project_path: Option<PathBuf>,
    pub status: TabStatus,
    /// Uncommitted prompt text.
    pub draft: String,
    pub log: MessageLog,
}

impl Tab {
    fn new(
        id: TabId,
        title: String,
        session_id: Option<String>,
        project_path: Option<PathBuf>,
    ) -> Self {
        Self {
            id,
            title,
            session_id,
            project_path,
            status: TabStatus::Idle,
            draft: String::new(),
            log: MessageLog::default(),
        }
    }

    fn from_record(record: TabRecord) -> Self {
        Self::new(
            TabId::from(record.id),
            record.title,
            record.session_id,
            record.project_path,
        )
    }

    fn to_record(&self) -> TabRecord {
        TabRecord {
            id: self.id.as_uuid(),
            title: self.title.clone(),
            session_id: self.session_id.clone(),
            project_path: self.project_path.clone(),
        }
    }

    /// True while the tab is streaming or holds a non-empty draft.
    pub fn has_unsaved_changes(&self) -> bool {
        self.status.is_streaming() || !self.draft.trim().is_empty()
    }

    fn attach_session(&mut self, session_id: String) {
        if self.session_id.is_some() {
            return;
        }
        if self.title == UNTITLED {
            self.title = short_session_id(&session_id);
        }
        self.session_id = Some(session_id);
    }
}

pub const UNTITLED: &str = "untitled";

/// Derives a tab title: explicit, else project basename, else short session
/// id, else `"untitled"`.
pub fn derive_title(
    explicit: Option<&str>,
    project_path: Option<&Path>,
    session_id: Option<&str>,
) -> String {
    if let Some(title) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    if let Some(name) = project_path
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
    {
        return name.to_string();
    }
    if let Some(id) = session_id.map(str::trim).filter(|s| !s.is_empty()) {
        return short_session_id(id);
    }
    UNTITLED.to_string()
}

fn short_session_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// The tab deck.
#[derive(Debug, Default)]
pub struct TabsState {
    tabs: Vec<Tab>,
    active: Option<TabId>,
}

impl TabsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the deck with persisted records. The first restored tab
    /// becomes active; an empty record list leaves the deck empty.
    pub fn restore(&mut self, records: Vec<TabRecord>) {
        self.tabs = records.into_iter().map(Tab::from_record).collect();
        self.active = self.tabs.first().map(|t| t.id);
    }

    pub fn apply(&mut self, mutation: TabsMutation) {
        match mutation {
            TabsMutation::Create {
                id,
                title,
                session_id,
                project_path,
            } => {
                self.tabs.push(Tab::new(id, title, session_id, project_path));
                self.active = Some(id);
            }
            TabsMutation::Activate { id } => {
                if self.contains(id) {
                    self.active = Some(id);
                } else {
                    tracing::warn!(target: "amux::tabs", "Cannot activate unknown tab {id}");
                }
            }
            TabsMutation::Remove { id } => self.remove(id),
            TabsMutation::Move { from, to } => self.move_tab(from, to),
            TabsMutation::SetStreaming {
                id,
                streaming,
                session_id,
            } => {
                let Some(tab) = self.get_mut(id) else {
                    tracing::warn!(target: "amux::tabs", "Streaming update for unknown tab {id}");
                    return;
                };
                if tab.status.is_error() {
                    tracing::debug!(
                        target: "amux::tabs",
                        "Ignoring streaming update for errored tab {id}"
                    );
                    return;
                }
                tab.status = if streaming {
                    TabStatus::Streaming
                } else {
                    TabStatus::Idle
                };
                if let Some(session_id) = session_id {
                    tab.attach_session(session_id);
                }
            }
            TabsMutation::AttachSession { id, session_id } => {
                let Some(tab) = self.get_mut(id) else {
                    tracing::warn!(target: "amux::tabs", "Session attach for unknown tab {id}");
                    return;
                };
                tab.attach_session(session_id);
            }
            TabsMutation::MarkError { id, message } => {
                let Some(tab) = self.get_mut(id) else {
                    tracing::warn!(target: "amux::tabs", "Error mark for unknown tab {id}");
                    return;
                };
                tab.status = TabStatus::Error { message };
            }
            TabsMutation::SetDraft { id, draft } => {
                let Some(tab) = self.get_mut(id) else {
                    tracing::warn!(target: "amux::tabs", "Draft update for unknown tab {id}");
                    return;
                };
                tab.draft = draft;
            }
            TabsMutation::AppendEvent { id, seq, event } => {
                let Some(tab) = self.get_mut(id) else {
                    tracing::warn!(
                        target: "amux::tabs",
                        "Dropping stream event for unknown tab {id}"
                    );
                    return;
                };
                tab.log.append(seq, event);
            }
        }
    }

    fn remove(&mut self, id: TabId) {
        let Some(idx) = self.position(id) else {
            tracing::warn!(target: "amux::tabs", "Cannot close unknown tab {id}");
            return;
        };
        self.tabs.remove(idx);

        if self.active == Some(id) {
            // Prefer the tab now at the same index (the next in order),
            // falling back to the last one when the end was closed.
            self.active = if self.tabs.is_empty() {
                None
            } else {
                let new_idx = idx.min(self.tabs.len().saturating_sub(1));
                Some(self.tabs[new_idx].id)
            };
        }
    }

    /// Reorders without touching activation; the active id stays valid by
    /// construction.
    fn move_tab(&mut self, from: usize, to: usize) {
        if from >= self.tabs.len() {
            tracing::warn!(
                target: "amux::tabs",
                "Cannot move tab from out-of-range position {from}"
            );
            return;
        }
        let to = to.min(self.tabs.len().saturating_sub(1));
        if from == to {
            return;
        }
        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
    }

    // ===== Accessors =====

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Snapshot for persistence, in deck order.
    pub fn records(&self) -> Vec<TabRecord> {
        self.tabs.iter().map(Tab::to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(tabs: &mut TabsState, title: &str) -> TabId {
        let id = TabId::new();
        tabs.apply(TabsMutation::Create {
            id,
            title: title.to_string(),
            session_id: None,
            project_path: Some(PathBuf::from(format!("/work/{title}"))),
        });
        id
    }

    fn sample_event() -> SessionEvent {
        SessionEvent::from_json_line(r#"{"type":"result","result":"ok"}"#).unwrap()
    }

    #[test]
    fn test_create_appends_and_activates() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        let b = create(&mut tabs, "b");

        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs.active_id(), Some(b));
        assert_eq!(tabs.position(a), Some(0));
        assert_eq!(tabs.position(b), Some(1));
    }

    #[test]
    fn test_close_active_activates_next_then_previous() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        let b = create(&mut tabs, "b");
        let c = create(&mut tabs, "c");

        tabs.apply(TabsMutation::Activate { id: b });
        tabs.apply(TabsMutation::Remove { id: b });
        // Next in order after b is c.
        assert_eq!(tabs.active_id(), Some(c));

        tabs.apply(TabsMutation::Remove { id: c });
        // c was last; fall back to the previous tab.
        assert_eq!(tabs.active_id(), Some(a));

        tabs.apply(TabsMutation::Remove { id: a });
        assert_eq!(tabs.active_id(), None);
        assert!(tabs.is_empty());
    }

    #[test]
    fn test_close_inactive_keeps_activation() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        let b = create(&mut tabs, "b");

        tabs.apply(TabsMutation::Remove { id: a });
        assert_eq!(tabs.active_id(), Some(b));
    }

    #[test]
    fn test_at_most_one_active_after_any_sequence() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        let b = create(&mut tabs, "b");
        let c = create(&mut tabs, "c");

        for mutation in [
            TabsMutation::Activate { id: a },
            TabsMutation::Move { from: 0, to: 2 },
            TabsMutation::Remove { id: b },
            TabsMutation::Activate { id: c },
            TabsMutation::Remove { id: c },
        ] {
            tabs.apply(mutation);
            let active_count = tabs
                .iter()
                .filter(|t| Some(t.id) == tabs.active_id())
                .count();
            if tabs.is_empty() {
                assert_eq!(tabs.active_id(), None);
            } else {
                assert_eq!(active_count, 1);
            }
        }
    }

    #[test]
    fn test_move_does_not_change_active() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        let _b = create(&mut tabs, "b");
        let _c = create(&mut tabs, "c");
        tabs.apply(TabsMutation::Activate { id: a });

        tabs.apply(TabsMutation::Move { from: 0, to: 2 });

        assert_eq!(tabs.active_id(), Some(a));
        assert_eq!(tabs.position(a), Some(2));
    }

    #[test]
    fn test_move_clamps_target() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        let _b = create(&mut tabs, "b");

        tabs.apply(TabsMutation::Move { from: 0, to: 99 });
        assert_eq!(tabs.position(a), Some(1));

        // Out-of-range source is a no-op.
        tabs.apply(TabsMutation::Move { from: 99, to: 0 });
        assert_eq!(tabs.position(a), Some(1));
    }

    #[test]
    fn test_streaming_attaches_session_id_once() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");

        tabs.apply(TabsMutation::SetStreaming {
            id: a,
            streaming: true,
            session_id: Some("sess-1".to_string()),
        });
        tabs.apply(TabsMutation::SetStreaming {
            id: a,
            streaming: false,
            session_id: Some("sess-2".to_string()),
        });

        let tab = tabs.get(a).unwrap();
        assert_eq!(tab.session_id.as_deref(), Some("sess-1"));
        assert_eq!(tab.status, TabStatus::Idle);
    }

    #[test]
    fn test_error_state_is_terminal() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");

        tabs.apply(TabsMutation::MarkError {
            id: a,
            message: "stream disconnected".to_string(),
        });
        tabs.apply(TabsMutation::SetStreaming {
            id: a,
            streaming: false,
            session_id: None,
        });

        assert!(tabs.get(a).unwrap().status.is_error());
    }

    #[test]
    fn test_log_stays_readable_after_error() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");

        tabs.apply(TabsMutation::AppendEvent {
            id: a,
            seq: 1,
            event: sample_event(),
        });
        tabs.apply(TabsMutation::MarkError {
            id: a,
            message: "gone".to_string(),
        });

        assert_eq!(tabs.get(a).unwrap().log.len(), 1);
    }

    #[test]
    fn test_append_drops_stale_sequence_numbers() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");

        for seq in [1, 2, 2, 1, 3] {
            tabs.apply(TabsMutation::AppendEvent {
                id: a,
                seq,
                event: sample_event(),
            });
        }

        let tab = tabs.get(a).unwrap();
        assert_eq!(tab.log.len(), 3);
        assert_eq!(tab.log.last_seq(), 3);
    }

    #[test]
    fn test_has_unsaved_changes() {
        let mut tabs = TabsState::new();
        let a = create(&mut tabs, "a");
        assert!(!tabs.get(a).unwrap().has_unsaved_changes());

        tabs.apply(TabsMutation::SetDraft {
            id: a,
            draft: "half-typed".to_string(),
        });
        assert!(tabs.get(a).unwrap().has_unsaved_changes());

        tabs.apply(TabsMutation::SetDraft {
            id: a,
            draft: "   ".to_string(),
        });
        assert!(!tabs.get(a).unwrap().has_unsaved_changes());

        tabs.apply(TabsMutation::SetStreaming {
            id: a,
            streaming: true,
            session_id: None,
        });
        assert!(tabs.get(a).unwrap().has_unsaved_changes());
    }

    #[test]
    fn test_restore_activates_first() {
        let records = vec![
            TabRecord {
                id: Uuid::new_v4(),
                title: "one".to_string(),
                session_id: Some("s1".to_string()),
                project_path: Some(PathBuf::from("/work/one")),
            },
            TabRecord {
                id: Uuid::new_v4(),
                title: "two".to_string(),
                session_id: None,
                project_path: None,
            },
        ];
        let first = TabId::from(records[0].id);

        let mut tabs = TabsState::new();
        tabs.restore(records);

        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs.active_id(), Some(first));
        assert_eq!(tabs.get(first).unwrap().session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_records_round_trip_deck_order() {
        let mut tabs = TabsState::new();
        create(&mut tabs, "a");
        create(&mut tabs, "b");
        tabs.apply(TabsMutation::Move { from: 1, to: 0 });

        let titles: Vec<String> = tabs.records().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_derive_title_precedence() {
        assert_eq!(
            derive_title(Some("My tab"), Some(Path::new("/w/app")), Some("sess")),
            "My tab"
        );
        assert_eq!(
            derive_title(None, Some(Path::new("/w/app")), Some("sess")),
            "app"
        );
        assert_eq!(
            derive_title(None, None, Some("0123456789abcdef")),
            "01234567"
        );
        assert_eq!(derive_title(Some("  "), None, None), UNTITLED);
    }

    #[test]
    fn test_untitled_upgrades_on_session_attach() {
        let mut tabs = TabsState::new();
        let id = TabId::new();
        tabs.apply(TabsMutation::Create {
            id,
            title: UNTITLED.to_string(),
            session_id: None,
            project_path: None,
        });

        tabs.apply(TabsMutation::AttachSession {
            id,
            session_id: "fedcba9876".to_string(),
        });

        assert_eq!(tabs.get(id).unwrap().title, "fedcba98");
    }
}
