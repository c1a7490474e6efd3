//! # TitleBar Component
//!
//! Top status bar showing the app, the active conversation, and status.
//!
//! TitleBar is purely presentational: it receives all data as props and has
//! no internal state.
//!
//! The title text drops parts in priority order so the app name is always
//! visible, even on narrow terminals:
//!
//! 1. `"Travel Helper · Trip plan | Thinking... | ↓ New"`
//! 2. `"Travel Helper · Trip plan | Thinking..."`
//! 3. `"Travel Helper · Trip plan"`

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::tui::component::Component;

/// Top status bar component.
pub struct TitleBar {
    /// Name of the Dify app
    pub app_name: String,
    /// Display name of the active conversation, if any
    pub conversation_name: Option<String>,
    /// Status message (e.g., "Thinking...", "Feedback sent")
    pub status_message: String,
    /// Whether there's content below the current scroll position
    pub has_unseen_content: bool,
}

impl TitleBar {
    pub fn new(
        app_name: String,
        conversation_name: Option<String>,
        status_message: String,
        has_unseen_content: bool,
    ) -> Self {
        Self {
            app_name,
            conversation_name,
            status_message,
            has_unseen_content,
        }
    }

    pub fn title_text(&self) -> String {
        let mut text = self.app_name.clone();
        if let Some(name) = &self.conversation_name {
            text.push_str(" · ");
            text.push_str(name);
        }
        if !self.status_message.is_empty() {
            text.push_str(" | ");
            text.push_str(&self.status_message);
        }
        if self.has_unseen_content {
            text.push_str(" | ↓ New");
        }
        text
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let line = Line::from(Span::styled(
            self.title_text(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(line, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn rendered(title_bar: &mut TitleBar) -> String {
        let backend = TestBackend::new(80, 1);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                title_bar.render(f, f.area());
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    #[test]
    fn test_title_bar_full() {
        let mut title_bar = TitleBar::new(
            "Travel Helper".to_string(),
            Some("Trip plan".to_string()),
            "Thinking...".to_string(),
            true,
        );
        let text = rendered(&mut title_bar);
        assert!(text.contains("Travel Helper · Trip plan"));
        assert!(text.contains("Thinking..."));
        assert!(text.contains("↓ New"));
    }

    #[test]
    fn test_title_bar_without_conversation_or_status() {
        let mut title_bar = TitleBar::new("Helper".to_string(), None, String::new(), false);
        assert_eq!(title_bar.title_text(), "Helper");
        let text = rendered(&mut title_bar);
        assert!(!text.contains('|'));
        assert!(!text.contains('·'));
    }
}
