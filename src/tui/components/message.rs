use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget};

use crate::api::Rating;
use crate::core::message::{ChatMessage, MessageStatus, Role};
use crate::tui::component::Component;

/// Blank columns inside each side border.
const CONTENT_PAD_H: u16 = 1;
/// Columns taken by both borders and padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Top and bottom border rows.
const VERTICAL_OVERHEAD: u16 = 2;

/// Above this the streaming border is bold.
const PULSE_BOLD_THRESHOLD: f32 = 0.6;
/// Below this the streaming border is dim.
const PULSE_NORMAL_THRESHOLD: f32 = 0.2;

fn thinking_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC)
}

fn role_style(message: &ChatMessage) -> Style {
    match (message.role, message.status) {
        (Role::Ai, MessageStatus::Error) => Style::default().fg(Color::Red),
        (Role::User, _) => Style::default().fg(Color::Green),
        (Role::Ai, _) => Style::default().fg(Color::Blue),
    }
}

/// A stateless component that renders a single chat message.
///
/// `Message` is a transient component: it's created fresh each frame by
/// `MessageList`, which owns selection and thinking-expansion state.
///
/// The body is laid out as sections, top to bottom: thinking (collapsed to
/// one line unless expanded), agent tool calls, the answer, attached files,
/// knowledge sources, and the error text for failed answers.
///
/// Lines are pre-wrapped with `textwrap`, so [`calculate_height`](Self::calculate_height)
/// matches the rendered height exactly.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    pub message: &'a ChatMessage,
    /// Whether this message is selected in Cursor mode or hovered
    pub is_selected: bool,
    /// Whether the thinking section is shown in full
    pub thinking_expanded: bool,
    /// 0.0..=1.0 while this answer is streaming, 0.0 otherwise
    pub pulse_intensity: f32,
}

impl<'a> Message<'a> {
    pub fn new(
        message: &'a ChatMessage,
        is_selected: bool,
        thinking_expanded: bool,
        pulse_intensity: f32,
    ) -> Self {
        Self {
            message,
            is_selected,
            thinking_expanded,
            pulse_intensity,
        }
    }

    /// Unwrapped body sections as `(text, style)` pairs.
    fn sections(message: &ChatMessage, thinking_expanded: bool) -> Vec<(String, Style)> {
        let mut sections = Vec::new();

        if let Some(thinking) = &message.thinking {
            if thinking_expanded {
                sections.push(("▾ Thinking".to_string(), thinking_style()));
                sections.push((thinking.clone(), thinking_style()));
                sections.push((String::new(), Style::default()));
            } else {
                sections.push(("▸ Thinking (Space to expand)".to_string(), thinking_style()));
            }
        }

        for thought in &message.agent_thoughts {
            if thought.tool.is_empty() {
                continue;
            }
            let mut text = format!("⚙ {}", thought.tool);
            if !thought.thought.trim().is_empty() {
                text.push_str(": ");
                text.push_str(thought.thought.trim());
            }
            sections.push((text, Style::default().fg(Color::Yellow)));
        }

        let content = message.content.trim();
        if content.is_empty() && message.status == MessageStatus::Loading {
            sections.push(("…".to_string(), thinking_style()));
        } else if !content.is_empty() {
            sections.push((content.to_string(), role_style(message)));
        }

        for file in &message.files {
            sections.push((
                format!("📎 {}", file.label()),
                Style::default().fg(Color::Magenta),
            ));
        }

        let mut sources: Vec<&str> = Vec::new();
        for resource in &message.retriever_resources {
            let name = resource.document_name.as_str();
            if !name.is_empty() && !sources.contains(&name) {
                sources.push(name);
            }
        }
        if !sources.is_empty() {
            sections.push((
                format!("Sources: {}", sources.join(", ")),
                Style::default().fg(Color::DarkGray),
            ));
        }

        if message.status == MessageStatus::Error {
            let error = if message.error.is_empty() {
                "Request failed"
            } else {
                message.error.as_str()
            };
            sections.push((format!("⚠ {error}"), Style::default().fg(Color::Red)));
        }

        sections
    }

    /// Body lines wrapped to `content_width`.
    fn wrapped_lines(
        message: &ChatMessage,
        thinking_expanded: bool,
        content_width: u16,
    ) -> Vec<Line<'static>> {
        let options = textwrap::Options::new(content_width as usize)
            .break_words(true)
            .word_separator(textwrap::WordSeparator::AsciiSpace);

        let mut lines = Vec::new();
        for (text, style) in Self::sections(message, thinking_expanded) {
            for raw_line in text.split('\n') {
                for wrapped in textwrap::wrap(raw_line, &options) {
                    lines.push(Line::from(Span::styled(wrapped.into_owned(), style)));
                }
            }
        }
        lines
    }

    /// Rows this message needs at `width`, borders included.
    pub fn calculate_height(message: &ChatMessage, thinking_expanded: bool, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            // Narrower than the borders themselves
            return 1;
        }
        let lines = Self::wrapped_lines(message, thinking_expanded, content_width);
        (lines.len() as u16).max(1) + VERTICAL_OVERHEAD
    }

    fn title(&self) -> String {
        let mut title = match self.message.role {
            Role::User => String::from("you"),
            Role::Ai => String::from("assistant"),
        };
        if let Some(created_at) = &self.message.created_at {
            title.push_str(" · ");
            title.push_str(created_at);
        }
        match self.message.feedback {
            Some(Rating::Like) => title.push_str(" · ▲ liked"),
            Some(Rating::Dislike) => title.push_str(" · ▼ disliked"),
            None => {}
        }
        title
    }
}

impl<'a> Widget for Message<'a> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let style = role_style(self.message);

        // Selection overrides role color; unselected borders are dim
        let mut border_style = if self.is_selected {
            Style::default().fg(Color::Cyan)
        } else {
            style.add_modifier(Modifier::DIM)
        };

        // Three-phase breathing while streaming: DIM → normal → BOLD
        if self.pulse_intensity > PULSE_BOLD_THRESHOLD {
            border_style = border_style
                .remove_modifier(Modifier::DIM)
                .add_modifier(Modifier::BOLD);
        } else if self.pulse_intensity > PULSE_NORMAL_THRESHOLD {
            border_style = border_style.remove_modifier(Modifier::DIM);
        }

        let block = Block::bordered()
            .title(self.title())
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner_area = block.inner(area);
        block.render(area, buf);

        let lines = Self::wrapped_lines(self.message, self.thinking_expanded, inner_area.width);
        Paragraph::new(lines).render(inner_area, buf);
    }
}

impl<'a> Component for Message<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}
