//! Tab event handlers.
//!
//! Handlers are pure: they read [`TabsState`] and return the effects and
//! mutations a deck operation calls for, never touching state themselves.

use crate::effects::{DeckEffect, DeckNotification};
use crate::events::{DeckCommand, SessionUpdate};
use crate::features::tabs::state::{derive_title, TabId, TabStatus, TabsState};
use crate::mutations::TabsMutation;
use amux_core::core::process::ProcessStatus;

pub fn handle_command(
    tabs: &TabsState,
    command: DeckCommand,
) -> (Vec<DeckEffect>, Vec<TabsMutation>) {
    match command {
        DeckCommand::NewTab {
            title,
            session_id,
            project_path,
            prompt,
        } => {
            let id = TabId::new();
            let title = derive_title(
                title.as_deref(),
                project_path.as_deref(),
                session_id.as_deref(),
            );

            let mut effects = vec![
                DeckEffect::Notify(DeckNotification::TabCreated { tab_id: id }),
                DeckEffect::PersistTabs,
            ];
            if let Some(prompt) = prompt {
                match project_path.clone() {
                    Some(path) => effects.push(DeckEffect::SpawnSession {
                        tab_id: id,
                        project_path: path,
                        prompt,
                        resume: session_id.clone(),
                    }),
                    None => tracing::warn!(
                        target: "amux::tabs",
                        "Tab {id} has no project path; prompt not sent"
                    ),
                }
            }

            let mutations = vec![TabsMutation::Create {
                id,
                title,
                session_id,
                project_path,
            }];
            (effects, mutations)
        }

        DeckCommand::SwitchTab { id } => {
            if !tabs.contains(id) {
                tracing::warn!(target: "amux::tabs", "Cannot switch to unknown tab {id}");
                return (Vec::new(), Vec::new());
            }
            (Vec::new(), vec![TabsMutation::Activate { id }])
        }

        DeckCommand::CloseTab { id, force } => {
            let Some(tab) = tabs.get(id) else {
                tracing::warn!(target: "amux::tabs", "Cannot close unknown tab {id}");
                return (Vec::new(), Vec::new());
            };
            if tab.has_unsaved_changes() && !force {
                let effects = vec![DeckEffect::Notify(
                    DeckNotification::CloseNeedsConfirmation { tab_id: id },
                )];
                return (effects, Vec::new());
            }
            let effects = vec![
                DeckEffect::CancelSubscription { tab_id: id },
                DeckEffect::TerminateSession { tab_id: id },
                DeckEffect::PersistTabs,
                DeckEffect::Notify(DeckNotification::TabClosed { tab_id: id }),
            ];
            (effects, vec![TabsMutation::Remove { id }])
        }

        DeckCommand::MoveTab { from, to } => {
            let effects = vec![DeckEffect::PersistTabs];
            (effects, vec![TabsMutation::Move { from, to }])
        }

        DeckCommand::SetDraft { id, draft } => {
            if !tabs.contains(id) {
                tracing::warn!(target: "amux::tabs", "Draft for unknown tab {id}");
                return (Vec::new(), Vec::new());
            }
            (Vec::new(), vec![TabsMutation::SetDraft { id, draft }])
        }

        DeckCommand::SendPrompt { id, prompt } => {
            let Some(tab) = tabs.get(id) else {
                tracing::warn!(target: "amux::tabs", "Cannot send prompt on unknown tab {id}");
                return (Vec::new(), Vec::new());
            };
            if tab.status.is_streaming() {
                tracing::warn!(
                    target: "amux::tabs",
                    "Tab {id} is already streaming; prompt not sent"
                );
                return (Vec::new(), Vec::new());
            }
            let Some(project_path) = tab.project_path.clone() else {
                tracing::warn!(
                    target: "amux::tabs",
                    "Tab {id} has no project path; prompt not sent"
                );
                return (Vec::new(), Vec::new());
            };
            let effects = vec![DeckEffect::SpawnSession {
                tab_id: id,
                project_path,
                prompt,
                resume: tab.session_id.clone(),
            }];
            (effects, Vec::new())
        }
    }
}

/// Routes one unit of session traffic to its tab. Traffic for unknown tabs
/// is dropped; a tab closed mid-stream simply stops receiving.
pub fn handle_session(
    tabs: &TabsState,
    tab_id: TabId,
    seq: u64,
    update: SessionUpdate,
) -> (Vec<DeckEffect>, Vec<TabsMutation>) {
    let Some(tab) = tabs.get(tab_id) else {
        tracing::debug!(
            target: "amux::tabs",
            "Dropping stream update for unknown tab {tab_id}"
        );
        return (Vec::new(), Vec::new());
    };

    match update {
        SessionUpdate::Status(status) => handle_status(tab_id, tab.status.is_error(), status),
        SessionUpdate::Event(event) => {
            if seq <= tab.log.last_seq() {
                tracing::debug!(
                    target: "amux::tabs",
                    "Dropping repeated stream event for tab {tab_id} (seq {seq})"
                );
                return (Vec::new(), Vec::new());
            }

            let mut effects = Vec::new();
            let mut mutations = Vec::new();
            if tab.session_id.is_none() {
                if let Some(session_id) = event.session_id() {
                    mutations.push(TabsMutation::AttachSession {
                        id: tab_id,
                        session_id: session_id.to_string(),
                    });
                    effects.push(DeckEffect::PersistTabs);
                }
            }
            effects.push(DeckEffect::Notify(DeckNotification::EventAppended {
                tab_id,
                event: event.clone(),
            }));
            mutations.push(TabsMutation::AppendEvent {
                id: tab_id,
                seq,
                event,
            });
            (effects, mutations)
        }
    }
}

fn handle_status(
    tab_id: TabId,
    errored: bool,
    status: ProcessStatus,
) -> (Vec<DeckEffect>, Vec<TabsMutation>) {
    if errored {
        // Terminal state: only closing the tab disposes of it.
        tracing::debug!(
            target: "amux::tabs",
            "Ignoring status update for errored tab {tab_id}"
        );
        return (Vec::new(), Vec::new());
    }

    match status {
        ProcessStatus::Started { session_id } => {
            let persist = session_id.is_some();
            let mutations = vec![TabsMutation::SetStreaming {
                id: tab_id,
                streaming: true,
                session_id,
            }];
            let mut effects = vec![DeckEffect::Notify(DeckNotification::TabStatusChanged {
                tab_id,
                status: TabStatus::Streaming,
            })];
            if persist {
                effects.push(DeckEffect::PersistTabs);
            }
            (effects, mutations)
        }
        ProcessStatus::Output => (Vec::new(), Vec::new()),
        ProcessStatus::Idle => {
            let mutations = vec![TabsMutation::SetStreaming {
                id: tab_id,
                streaming: false,
                session_id: None,
            }];
            let effects = vec![DeckEffect::Notify(DeckNotification::TabStatusChanged {
                tab_id,
                status: TabStatus::Idle,
            })];
            (effects, mutations)
        }
        ProcessStatus::Failed { message } => {
            let mutations = vec![TabsMutation::MarkError {
                id: tab_id,
                message: message.clone(),
            }];
            let effects = vec![
                DeckEffect::CancelSubscription { tab_id },
                DeckEffect::Notify(DeckNotification::TabStatusChanged {
                    tab_id,
                    status: TabStatus::Error { message },
                }),
            ];
            (effects, mutations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amux_core::core::events::SessionEvent;
    use std::path::PathBuf;

    fn deck_with_tab(title: &str) -> (TabsState, TabId) {
        let mut tabs = TabsState::new();
        let id = TabId::new();
        tabs.apply(TabsMutation::Create {
            id,
            title: title.to_string(),
            session_id: None,
            project_path: Some(PathBuf::from("/work/app")),
        });
        (tabs, id)
    }

    fn apply_all(tabs: &mut TabsState, mutations: Vec<TabsMutation>) {
        for mutation in mutations {
            tabs.apply(mutation);
        }
    }

    fn assistant_event(session_id: &str) -> SessionEvent {
        SessionEvent::from_json_line(&format!(
            r#"{{"type":"assistant","message":{{"content":[{{"type":"text","text":"hi"}}]}},"session_id":"{session_id}"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_new_tab_with_prompt_spawns_session() {
        let tabs = TabsState::new();
        let (effects, mutations) = handle_command(
            &tabs,
            DeckCommand::NewTab {
                title: None,
                session_id: None,
                project_path: Some(PathBuf::from("/work/app")),
                prompt: Some("hello".to_string()),
            },
        );

        assert!(matches!(mutations[0], TabsMutation::Create { .. }));
        assert!(effects
            .iter()
            .any(|e| matches!(e, DeckEffect::SpawnSession { prompt, .. } if prompt == "hello")));
        assert!(effects.iter().any(|e| matches!(e, DeckEffect::PersistTabs)));
    }

    #[test]
    fn test_new_tab_without_project_path_skips_spawn() {
        let tabs = TabsState::new();
        let (effects, mutations) = handle_command(
            &tabs,
            DeckCommand::NewTab {
                title: Some("scratch".to_string()),
                session_id: None,
                project_path: None,
                prompt: Some("hello".to_string()),
            },
        );

        assert_eq!(mutations.len(), 1);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, DeckEffect::SpawnSession { .. })));
    }

    #[test]
    fn test_close_with_unsaved_changes_requires_confirmation() {
        let (mut tabs, id) = deck_with_tab("a");
        tabs.apply(TabsMutation::SetDraft {
            id,
            draft: "unsent".to_string(),
        });

        let (effects, mutations) =
            handle_command(&tabs, DeckCommand::CloseTab { id, force: false });

        assert!(mutations.is_empty());
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            effects[0],
            DeckEffect::Notify(DeckNotification::CloseNeedsConfirmation { tab_id }) if tab_id == id
        ));

        // The tab survives untouched.
        apply_all(&mut tabs, mutations);
        assert!(tabs.contains(id));
    }

    #[test]
    fn test_force_close_discards_unsaved_changes() {
        let (mut tabs, id) = deck_with_tab("a");
        tabs.apply(TabsMutation::SetDraft {
            id,
            draft: "unsent".to_string(),
        });

        let (effects, mutations) = handle_command(&tabs, DeckCommand::CloseTab { id, force: true });

        assert!(effects
            .iter()
            .any(|e| matches!(e, DeckEffect::TerminateSession { tab_id } if *tab_id == id)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, DeckEffect::CancelSubscription { tab_id } if *tab_id == id)));

        apply_all(&mut tabs, mutations);
        assert!(!tabs.contains(id));
    }

    #[test]
    fn test_clean_close_needs_no_confirmation() {
        let (mut tabs, id) = deck_with_tab("a");

        let (effects, mutations) =
            handle_command(&tabs, DeckCommand::CloseTab { id, force: false });

        assert!(effects
            .iter()
            .any(|e| matches!(e, DeckEffect::Notify(DeckNotification::TabClosed { .. }))));
        apply_all(&mut tabs, mutations);
        assert!(tabs.is_empty());
    }

    #[test]
    fn test_send_prompt_resumes_attached_session() {
        let (mut tabs, id) = deck_with_tab("a");
        tabs.apply(TabsMutation::AttachSession {
            id,
            session_id: "sess-7".to_string(),
        });

        let (effects, _) = handle_command(
            &tabs,
            DeckCommand::SendPrompt {
                id,
                prompt: "continue".to_string(),
            },
        );

        assert!(effects.iter().any(|e| matches!(
            e,
            DeckEffect::SpawnSession { resume: Some(r), .. } if r == "sess-7"
        )));
    }

    #[test]
    fn test_send_prompt_rejected_while_streaming() {
        let (mut tabs, id) = deck_with_tab("a");
        tabs.apply(TabsMutation::SetStreaming {
            id,
            streaming: true,
            session_id: None,
        });

        let (effects, mutations) = handle_command(
            &tabs,
            DeckCommand::SendPrompt {
                id,
                prompt: "again".to_string(),
            },
        );

        assert!(effects.is_empty());
        assert!(mutations.is_empty());
    }

    #[test]
    fn test_started_status_marks_streaming() {
        let (mut tabs, id) = deck_with_tab("a");

        let (effects, mutations) = handle_session(
            &tabs,
            id,
            1,
            SessionUpdate::Status(ProcessStatus::Started {
                session_id: Some("sess-1".to_string()),
            }),
        );

        assert!(effects.iter().any(|e| matches!(
            e,
            DeckEffect::Notify(DeckNotification::TabStatusChanged {
                status: TabStatus::Streaming,
                ..
            })
        )));
        apply_all(&mut tabs, mutations);
        let tab = tabs.get(id).unwrap();
        assert!(tab.status.is_streaming());
        assert_eq!(tab.session_id.as_deref(), Some("sess-1"));
    }

    #[test]
    fn test_failed_status_is_terminal() {
        let (mut tabs, id) = deck_with_tab("a");

        let (_, mutations) = handle_session(
            &tabs,
            id,
            1,
            SessionUpdate::Status(ProcessStatus::Failed {
                message: "stream disconnected".to_string(),
            }),
        );
        apply_all(&mut tabs, mutations);
        assert!(tabs.get(id).unwrap().status.is_error());

        // A late Idle no longer produces anything.
        let (effects, mutations) =
            handle_session(&tabs, id, 2, SessionUpdate::Status(ProcessStatus::Idle));
        assert!(effects.is_empty());
        assert!(mutations.is_empty());
    }

    #[test]
    fn test_event_attaches_session_id_and_notifies() {
        let (mut tabs, id) = deck_with_tab("a");

        let (effects, mutations) = handle_session(
            &tabs,
            id,
            1,
            SessionUpdate::Event(assistant_event("sess-9")),
        );

        assert!(effects
            .iter()
            .any(|e| matches!(e, DeckEffect::Notify(DeckNotification::EventAppended { .. }))));
        assert!(effects.iter().any(|e| matches!(e, DeckEffect::PersistTabs)));
        apply_all(&mut tabs, mutations);
        let tab = tabs.get(id).unwrap();
        assert_eq!(tab.session_id.as_deref(), Some("sess-9"));
        assert_eq!(tab.log.len(), 1);
    }

    #[test]
    fn test_repeated_event_produces_no_notification() {
        let (mut tabs, id) = deck_with_tab("a");
        let (_, mutations) =
            handle_session(&tabs, id, 3, SessionUpdate::Event(assistant_event("s")));
        apply_all(&mut tabs, mutations);

        let (effects, mutations) =
            handle_session(&tabs, id, 3, SessionUpdate::Event(assistant_event("s")));

        assert!(effects.is_empty());
        assert!(mutations.is_empty());
        assert_eq!(tabs.get(id).unwrap().log.len(), 1);
    }

    #[test]
    fn test_traffic_for_unknown_tab_is_dropped() {
        let tabs = TabsState::new();
        let (effects, mutations) = handle_session(
            &tabs,
            TabId::new(),
            1,
            SessionUpdate::Status(ProcessStatus::Idle),
        );
        assert!(effects.is_empty());
        assert!(mutations.is_empty());
    }
}
