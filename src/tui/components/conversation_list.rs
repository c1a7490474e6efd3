//! # Conversation List Component
//!
//! Full-screen overlay for switching, creating, renaming and deleting
//! conversations. Opened with Ctrl+O, dismissed with Esc.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `ConversationListState` lives in `TuiState` (cursor, delete
//!   confirmation, rename buffer)
//! - `ConversationPicker` is created each frame and borrows the
//!   conversations from `App`

use chrono::{DateTime, Local, Utc};
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph};

use crate::core::conversation::Conversation;
use crate::tui::components::centered_rect;
use crate::tui::event::TuiEvent;

/// Events emitted by the conversation list.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    Open(String),
    CreateNew,
    Rename { id: String, name: String },
    Delete(String),
    Dismiss,
}

/// Persistent state for the conversation overlay.
#[derive(Default)]
pub struct ConversationListState {
    pub selected: usize,
    pub confirm_delete: bool,
    /// `Some` while the selected conversation's name is being edited
    pub rename_buffer: Option<String>,
    pub list_state: ListState,
}

impl ConversationListState {
    /// Fresh state with the cursor on the active conversation.
    pub fn new(conversations: &[Conversation], active_id: Option<&str>) -> Self {
        let selected = active_id
            .and_then(|id| conversations.iter().position(|c| c.id == id))
            .unwrap_or(0);
        let mut list_state = ListState::default();
        if !conversations.is_empty() {
            list_state.select(Some(selected));
        }
        Self {
            selected,
            confirm_delete: false,
            rename_buffer: None,
            list_state,
        }
    }

    /// Keep the cursor inside the list after it shrank.
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
            self.list_state.select(None);
        } else {
            self.selected = self.selected.min(len - 1);
            self.list_state.select(Some(self.selected));
        }
    }

    /// Handle a key event against the current conversations.
    pub fn handle_event(
        &mut self,
        event: &TuiEvent,
        conversations: &[Conversation],
    ) -> Option<ConversationEvent> {
        if self.rename_buffer.is_some() {
            return self.handle_rename(event, conversations);
        }

        // Reset delete confirmation on any non-delete key
        if !matches!(event, TuiEvent::InputChar('d')) {
            self.confirm_delete = false;
        }

        match event {
            TuiEvent::Escape => Some(ConversationEvent::Dismiss),
            TuiEvent::CursorUp => {
                if !conversations.is_empty() {
                    self.selected = self.selected.saturating_sub(1);
                    self.list_state.select(Some(self.selected));
                }
                None
            }
            TuiEvent::CursorDown => {
                if !conversations.is_empty() {
                    self.selected = (self.selected + 1).min(conversations.len() - 1);
                    self.list_state.select(Some(self.selected));
                }
                None
            }
            TuiEvent::Submit => conversations
                .get(self.selected)
                .map(|c| ConversationEvent::Open(c.id.clone())),
            TuiEvent::InputChar('n') => Some(ConversationEvent::CreateNew),
            TuiEvent::InputChar('r') => {
                if let Some(c) = conversations.get(self.selected) {
                    self.rename_buffer = Some(c.display_name().to_string());
                }
                None
            }
            TuiEvent::InputChar('d') => {
                let c = conversations.get(self.selected)?;
                if self.confirm_delete {
                    self.confirm_delete = false;
                    Some(ConversationEvent::Delete(c.id.clone()))
                } else {
                    self.confirm_delete = true;
                    None
                }
            }
            _ => None,
        }
    }

    fn handle_rename(
        &mut self,
        event: &TuiEvent,
        conversations: &[Conversation],
    ) -> Option<ConversationEvent> {
        let buffer = self.rename_buffer.as_mut()?;
        match event {
            TuiEvent::Escape => {
                self.rename_buffer = None;
                None
            }
            TuiEvent::InputChar(c) if *c != '\n' => {
                buffer.push(*c);
                None
            }
            TuiEvent::Paste(text) => {
                buffer.push_str(&text.replace(['\r', '\n'], " "));
                None
            }
            TuiEvent::Backspace => {
                buffer.pop();
                None
            }
            TuiEvent::Submit => {
                let name = buffer.trim().to_string();
                self.rename_buffer = None;
                if name.is_empty() {
                    return None;
                }
                conversations
                    .get(self.selected)
                    .map(|c| ConversationEvent::Rename {
                        id: c.id.clone(),
                        name,
                    })
            }
            _ => None,
        }
    }
}

/// Transient render wrapper for the conversation overlay.
pub struct ConversationPicker<'a> {
    state: &'a mut ConversationListState,
    conversations: &'a [Conversation],
    active_id: Option<&'a str>,
}

impl<'a> ConversationPicker<'a> {
    pub fn new(
        state: &'a mut ConversationListState,
        conversations: &'a [Conversation],
        active_id: Option<&'a str>,
    ) -> Self {
        Self {
            state,
            conversations,
            active_id,
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let overlay = centered_rect(80, 70, area);
        frame.render_widget(Clear, overlay);

        let help_text = if self.state.rename_buffer.is_some() {
            " Enter Save  Esc Cancel "
        } else if self.state.confirm_delete {
            " Press d again to confirm delete | Esc Cancel "
        } else {
            " n New  r Rename  d Delete  Enter Open  Esc Back "
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Conversations ")
            .title_alignment(Alignment::Left)
            .title_bottom(Line::from(help_text).centered())
            .padding(Padding::horizontal(1));

        if self.conversations.is_empty() {
            let empty = Paragraph::new("No conversations yet. Press n to start one.")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(empty, overlay);
            return;
        }

        let items: Vec<ListItem> = self
            .conversations
            .iter()
            .enumerate()
            .map(|(i, conversation)| {
                let is_selected = i == self.state.selected;
                let marker = if self.active_id == Some(conversation.id.as_str()) {
                    "● "
                } else {
                    "  "
                };
                let name = match (&self.state.rename_buffer, is_selected) {
                    (Some(buffer), true) => format!("{buffer}▏"),
                    _ => conversation.display_name().to_string(),
                };

                let style = if is_selected {
                    let fg = if self.state.confirm_delete {
                        Color::Red
                    } else {
                        Color::White
                    };
                    Style::default()
                        .fg(fg)
                        .add_modifier(Modifier::BOLD | Modifier::REVERSED)
                } else {
                    Style::default().fg(Color::Gray)
                };

                ListItem::new(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(short_date(conversation.updated_at), style),
                    Span::styled("  ", style),
                    Span::styled(name, style),
                ]))
            })
            .collect();

        frame.render_stateful_widget(List::new(items).block(block), overlay, &mut self.state.list_state);
    }
}

/// "Jan 15" style date in local time.
fn short_date(ts: i64) -> String {
    let dt: DateTime<Local> = DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .with_timezone(&Local);
    dt.format("%b %d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversations() -> Vec<Conversation> {
        ["c1", "c2", "c3"]
            .iter()
            .map(|id| Conversation {
                id: id.to_string(),
                name: format!("Chat {id}"),
                created_at: 1_700_000_000,
                updated_at: 1_700_000_000,
            })
            .collect()
    }

    #[test]
    fn test_starts_on_active_conversation() {
        let list = conversations();
        let state = ConversationListState::new(&list, Some("c2"));
        assert_eq!(state.selected, 1);
        assert_eq!(state.list_state.selected(), Some(1));
    }

    #[test]
    fn test_navigate_and_open() {
        let list = conversations();
        let mut state = ConversationListState::new(&list, None);
        state.handle_event(&TuiEvent::CursorDown, &list);
        state.handle_event(&TuiEvent::CursorDown, &list);
        state.handle_event(&TuiEvent::CursorDown, &list);
        assert_eq!(state.selected, 2);
        assert_eq!(
            state.handle_event(&TuiEvent::Submit, &list),
            Some(ConversationEvent::Open("c3".into()))
        );
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let list = conversations();
        let mut state = ConversationListState::new(&list, None);
        assert_eq!(state.handle_event(&TuiEvent::InputChar('d'), &list), None);
        assert!(state.confirm_delete);
        assert_eq!(
            state.handle_event(&TuiEvent::InputChar('d'), &list),
            Some(ConversationEvent::Delete("c1".into()))
        );

        // Any other key cancels the pending confirmation
        state.handle_event(&TuiEvent::InputChar('d'), &list);
        state.handle_event(&TuiEvent::CursorDown, &list);
        assert!(!state.confirm_delete);
    }

    #[test]
    fn test_rename_edits_inline() {
        let list = conversations();
        let mut state = ConversationListState::new(&list, None);
        state.handle_event(&TuiEvent::InputChar('r'), &list);
        assert_eq!(state.rename_buffer.as_deref(), Some("Chat c1"));

        for _ in 0.."Chat c1".len() {
            state.handle_event(&TuiEvent::Backspace, &list);
        }
        // 'd' and 'n' are text while renaming
        for c in "dinner".chars() {
            assert_eq!(state.handle_event(&TuiEvent::InputChar(c), &list), None);
        }
        assert_eq!(
            state.handle_event(&TuiEvent::Submit, &list),
            Some(ConversationEvent::Rename {
                id: "c1".into(),
                name: "dinner".into()
            })
        );
        assert!(state.rename_buffer.is_none());
    }

    #[test]
    fn test_rename_escape_and_blank_name() {
        let list = conversations();
        let mut state = ConversationListState::new(&list, None);
        state.handle_event(&TuiEvent::InputChar('r'), &list);
        assert_eq!(state.handle_event(&TuiEvent::Escape, &list), None);
        assert!(state.rename_buffer.is_none());

        state.rename_buffer = Some("   ".into());
        assert_eq!(state.handle_event(&TuiEvent::Submit, &list), None);
    }

    #[test]
    fn test_clamp_after_removal() {
        let list = conversations();
        let mut state = ConversationListState::new(&list, Some("c3"));
        state.clamp(2);
        assert_eq!(state.selected, 1);
        state.clamp(0);
        assert_eq!(state.list_state.selected(), None);
    }
}
