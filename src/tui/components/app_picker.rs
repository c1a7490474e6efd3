//! # App Picker Component
//!
//! Full-screen overlay for switching between the Dify apps in the app
//! store. Opened with Ctrl+A in multi-app mode.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `AppPickerState` lives in `TuiState`
//! - `AppPicker` is created each frame with borrowed state

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph};

use crate::core::app_store::DifyAppItem;
use crate::tui::components::centered_rect;
use crate::tui::event::TuiEvent;

/// Persistent state for the app picker overlay.
pub struct AppPickerState {
    pub apps: Vec<DifyAppItem>,
    pub selected: usize,
    pub list_state: ListState,
}

impl AppPickerState {
    pub fn new(apps: Vec<DifyAppItem>, current_id: Option<&str>) -> Self {
        let selected = current_id
            .and_then(|id| apps.iter().position(|a| a.id == id))
            .unwrap_or(0);
        let mut list_state = ListState::default();
        if !apps.is_empty() {
            list_state.select(Some(selected));
        }
        Self {
            apps,
            selected,
            list_state,
        }
    }

    /// Handle a key event, returning an AppPickerEvent if the overlay should act.
    pub fn handle_event(&mut self, event: &TuiEvent) -> Option<AppPickerEvent> {
        match event {
            TuiEvent::Escape => Some(AppPickerEvent::Dismiss),
            TuiEvent::CursorUp => {
                if !self.apps.is_empty() {
                    self.selected = self.selected.saturating_sub(1);
                    self.list_state.select(Some(self.selected));
                }
                None
            }
            TuiEvent::CursorDown => {
                if !self.apps.is_empty() {
                    self.selected = (self.selected + 1).min(self.apps.len() - 1);
                    self.list_state.select(Some(self.selected));
                }
                None
            }
            TuiEvent::Submit => self
                .apps
                .get(self.selected)
                .map(|app| AppPickerEvent::Select(app.clone())),
            _ => None,
        }
    }
}

/// Events emitted by the app picker.
#[derive(Debug, Clone, PartialEq)]
pub enum AppPickerEvent {
    Select(DifyAppItem),
    Dismiss,
}

/// Transient render wrapper for the app picker overlay.
pub struct AppPicker<'a> {
    state: &'a mut AppPickerState,
    current_id: Option<&'a str>,
}

impl<'a> AppPicker<'a> {
    pub fn new(state: &'a mut AppPickerState, current_id: Option<&'a str>) -> Self {
        Self { state, current_id }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let overlay = centered_rect(70, 60, area);
        frame.render_widget(Clear, overlay);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Apps ")
            .title_alignment(Alignment::Left)
            .title_bottom(Line::from(" Enter Select  Esc Back ").centered())
            .padding(Padding::horizontal(1));

        if self.state.apps.is_empty() {
            let empty = Paragraph::new(
                "No apps configured.\nAdd one with: dify-chat apps add <name> --api-key <key>",
            )
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
            frame.render_widget(empty, overlay);
            return;
        }

        let items: Vec<ListItem> = self
            .state
            .apps
            .iter()
            .enumerate()
            .map(|(i, app)| {
                let is_selected = i == self.state.selected;
                let is_active = self.current_id == Some(app.id.as_str());

                let style = if is_selected {
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD | Modifier::REVERSED)
                } else if is_active {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Gray)
                };
                let dim = if is_selected {
                    style
                } else {
                    Style::default().fg(Color::DarkGray)
                };

                let mut spans = vec![Span::styled(app.info.name.clone(), style)];
                if !app.info.tags.is_empty() {
                    spans.push(Span::styled(format!("  [{}]", app.info.tags.join(", ")), dim));
                }
                if !app.info.description.is_empty() {
                    spans.push(Span::styled(format!("  {}", app.info.description), dim));
                }
                if is_active {
                    spans.push(Span::styled(" *", style));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        frame.render_stateful_widget(List::new(items).block(block), overlay, &mut self.state.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn apps() -> Vec<DifyAppItem> {
        vec![
            DifyAppItem::new("Travel", "https://api.dify.ai/v1", "app-1"),
            DifyAppItem::new("Support", "https://api.dify.ai/v1", "app-2"),
        ]
    }

    #[test]
    fn test_starts_on_current_app() {
        let apps = apps();
        let current = apps[1].id.clone();
        let state = AppPickerState::new(apps, Some(&current));
        assert_eq!(state.selected, 1);
    }

    #[test]
    fn test_select_and_dismiss() {
        let mut state = AppPickerState::new(apps(), None);
        state.handle_event(&TuiEvent::CursorDown);
        match state.handle_event(&TuiEvent::Submit) {
            Some(AppPickerEvent::Select(app)) => assert_eq!(app.info.name, "Support"),
            other => panic!("expected Select, got {other:?}"),
        }
        assert_eq!(
            state.handle_event(&TuiEvent::Escape),
            Some(AppPickerEvent::Dismiss)
        );
    }

    #[test]
    fn test_render_lists_names() {
        let mut state = AppPickerState::new(apps(), None);
        let backend = TestBackend::new(60, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| AppPicker::new(&mut state, None).render(f, f.area()))
            .unwrap();
        let text = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>();
        assert!(text.contains("Travel"));
        assert!(text.contains("Support"));
    }
}
