//! # InputBox Component
//!
//! Multi-line message editor at the bottom of the chat screen.
//!
//! ## Responsibilities
//!
//! - Capture text input (typing, paste, newline via Ctrl+J / Shift+Enter)
//! - Editing and cursor movement across hard-wrapped visual lines
//! - Submission (Enter), suppressed while an answer is streaming
//! - Show pending attachment count and streaming state in the title
//!
//! ## State Management
//!
//! The buffer and cursor are internal state. `is_requesting` and
//! `attachments` are props refreshed from `App` before each frame.
//!
//! Lines are hard-wrapped by display width (`unicode-width`) rather than at
//! word boundaries, so every byte offset maps to exactly one screen cell.

use std::ops::Range;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Border (2) + padding (2) consumed horizontally by the bordered block
const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders consumed vertically
const VERTICAL_OVERHEAD: u16 = 2;
/// Maximum visible content lines before internal scrolling kicks in
const MAX_VISIBLE_LINES: u16 = 5;
/// Offset from area edge to the first text cell (border + padding)
const TEXT_OFFSET_X: u16 = 2;
const TEXT_OFFSET_Y: u16 = 1;

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// User submitted the text (Enter pressed)
    Submit(String),
    /// Text or cursor changed
    ContentChanged,
}

/// Text input component.
pub struct InputBox {
    /// Text buffer (Internal State)
    pub buffer: String,
    /// Cursor position as byte offset in buffer (0..=buffer.len())
    cursor: usize,
    /// First visible visual line
    scroll_offset: u16,
    /// Text width from the last render (used for vertical movement)
    last_text_width: u16,
    /// An answer is streaming; Enter does nothing (Prop)
    pub is_requesting: bool,
    /// Number of files that will go out with the next message (Prop)
    pub attachments: usize,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            scroll_offset: 0,
            last_text_width: 76,
            is_requesting: false,
            attachments: 0,
        }
    }

    /// Replace the buffer (e.g. with a suggested question), cursor at the end.
    pub fn set_text(&mut self, text: &str) {
        self.buffer = text.to_string();
        self.cursor = self.buffer.len();
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Required height for the current buffer, clamped to the viewport limit.
    pub fn calculate_height(&self, area_width: u16) -> u16 {
        let lines = visual_lines(&self.buffer, text_width(area_width)).len() as u16;
        lines.clamp(1, MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    fn title(&self) -> String {
        let mut title = if self.is_requesting {
            String::from("Waiting for reply (Esc to stop)")
        } else {
            String::from("Message")
        };
        if self.attachments > 0 {
            title.push_str(&format!(" · 📎 {}", self.attachments));
        }
        title
    }

    /// (visual line, display column) of the cursor.
    fn cursor_line_col(&self, lines: &[Range<usize>]) -> (usize, usize) {
        let line = lines
            .iter()
            .rposition(|r| r.start <= self.cursor)
            .unwrap_or(0);
        let start = lines.get(line).map_or(0, |r| r.start);
        (line, self.buffer[start..self.cursor].width())
    }

    fn move_vertically(&mut self, down: bool) -> bool {
        let lines = visual_lines(&self.buffer, self.last_text_width);
        let (line, col) = self.cursor_line_col(&lines);
        let target = if down {
            line + 1
        } else {
            match line.checked_sub(1) {
                Some(target) => target,
                None => return false,
            }
        };
        let Some(range) = lines.get(target) else {
            return false;
        };

        let mut pos = range.start;
        let mut width = 0;
        for (i, c) in self.buffer[range.clone()].char_indices() {
            let w = c.width().unwrap_or(0);
            if width + w > col {
                break;
            }
            width += w;
            pos = range.start + i + c.len_utf8();
        }
        self.cursor = pos;
        true
    }

    fn update_scroll_offset(&mut self, cursor_line: u16) {
        if cursor_line < self.scroll_offset {
            self.scroll_offset = cursor_line;
        } else if cursor_line >= self.scroll_offset + MAX_VISIBLE_LINES {
            self.scroll_offset = cursor_line + 1 - MAX_VISIBLE_LINES;
        }
    }
}

fn text_width(area_width: u16) -> u16 {
    area_width.saturating_sub(HORIZONTAL_OVERHEAD)
}

/// Split `text` into visual lines no wider than `width` cells.
/// Ranges are byte offsets; a newline belongs to no line.
fn visual_lines(text: &str, width: u16) -> Vec<Range<usize>> {
    let width = width.max(1) as usize;
    let mut lines = Vec::new();
    let mut offset = 0;

    for logical in text.split('\n') {
        let mut start = offset;
        let mut col = 0;
        for (i, c) in logical.char_indices() {
            let w = c.width().unwrap_or(0);
            if col + w > width && col > 0 {
                lines.push(start..offset + i);
                start = offset + i;
                col = 0;
            }
            col += w;
        }
        lines.push(start..offset + logical.len());
        offset += logical.len() + 1;
    }
    lines
}

fn prev_char_boundary(text: &str, pos: usize) -> usize {
    text[..pos]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map(|c| pos + c.len_utf8())
        .unwrap_or(text.len())
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let width = text_width(area.width);
        self.last_text_width = width;

        let lines = visual_lines(&self.buffer, width);
        let (cursor_line, cursor_col) = self.cursor_line_col(&lines);
        self.update_scroll_offset(cursor_line as u16);

        let visible: Vec<Line> = lines
            .iter()
            .skip(self.scroll_offset as usize)
            .take(MAX_VISIBLE_LINES as usize)
            .map(|r| Line::from(self.buffer[r.clone()].to_string()))
            .collect();

        let border_style = if self.is_requesting {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green)
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title(self.title())
            .padding(Padding::horizontal(1));

        let style = if self.is_requesting {
            Style::default().add_modifier(Modifier::DIM)
        } else {
            Style::default()
        };
        frame.render_widget(Paragraph::new(visible).style(style).block(block), area);

        let row = (cursor_line as u16).saturating_sub(self.scroll_offset);
        frame.set_cursor_position((
            area.x + TEXT_OFFSET_X + cursor_col as u16,
            area.y + TEXT_OFFSET_Y + row,
        ));
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.cursor, *c);
                self.cursor += c.len_utf8();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                let text = text.replace("\r\n", "\n");
                self.buffer.insert_str(self.cursor, &text);
                self.cursor += text.len();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace => (self.cursor > 0).then(|| {
                let prev = prev_char_boundary(&self.buffer, self.cursor);
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                InputEvent::ContentChanged
            }),
            TuiEvent::Delete => (self.cursor < self.buffer.len()).then(|| {
                let next = next_char_boundary(&self.buffer, self.cursor);
                self.buffer.drain(self.cursor..next);
                InputEvent::ContentChanged
            }),
            TuiEvent::CursorLeft => (self.cursor > 0).then(|| {
                self.cursor = prev_char_boundary(&self.buffer, self.cursor);
                InputEvent::ContentChanged
            }),
            TuiEvent::CursorRight => (self.cursor < self.buffer.len()).then(|| {
                self.cursor = next_char_boundary(&self.buffer, self.cursor);
                InputEvent::ContentChanged
            }),
            TuiEvent::CursorHome => {
                let line_start = self.buffer[..self.cursor]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                (self.cursor != line_start).then(|| {
                    self.cursor = line_start;
                    InputEvent::ContentChanged
                })
            }
            TuiEvent::CursorEnd => {
                let line_end = self.buffer[self.cursor..]
                    .find('\n')
                    .map(|i| self.cursor + i)
                    .unwrap_or(self.buffer.len());
                (self.cursor != line_end).then(|| {
                    self.cursor = line_end;
                    InputEvent::ContentChanged
                })
            }
            TuiEvent::CursorUp => self
                .move_vertically(false)
                .then_some(InputEvent::ContentChanged),
            TuiEvent::CursorDown => self
                .move_vertically(true)
                .then_some(InputEvent::ContentChanged),
            TuiEvent::Submit => {
                if self.is_requesting || self.buffer.trim().is_empty() {
                    return None;
                }
                let text = std::mem::take(&mut self.buffer);
                self.cursor = 0;
                self.scroll_offset = 0;
                Some(InputEvent::Submit(text))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle_event(&TuiEvent::InputChar(c));
        }
        input
    }

    #[test]
    fn test_handle_input() {
        let mut input = InputBox::new();
        assert_eq!(
            input.handle_event(&TuiEvent::InputChar('a')),
            Some(InputEvent::ContentChanged)
        );
        input.handle_event(&TuiEvent::InputChar('b'));
        assert_eq!(input.buffer, "ab");

        input.handle_event(&TuiEvent::Backspace);
        assert_eq!(input.buffer, "a");
        assert_eq!(input.cursor(), 1);
    }

    #[test]
    fn test_multibyte_editing() {
        let mut input = typed("café");
        input.handle_event(&TuiEvent::CursorLeft);
        input.handle_event(&TuiEvent::Delete);
        assert_eq!(input.buffer, "caf");
        input.handle_event(&TuiEvent::Backspace);
        assert_eq!(input.buffer, "ca");
    }

    #[test]
    fn test_submit_clears_buffer() {
        let mut input = typed("hello");
        assert_eq!(
            input.handle_event(&TuiEvent::Submit),
            Some(InputEvent::Submit("hello".to_string()))
        );
        assert!(input.buffer.is_empty());
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn test_submit_ignored_when_blank_or_requesting() {
        let mut input = typed("   ");
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);

        let mut input = typed("hello");
        input.is_requesting = true;
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);
        assert_eq!(input.buffer, "hello");
    }

    #[test]
    fn test_set_text_moves_cursor_to_end() {
        let mut input = InputBox::new();
        input.set_text("What can you do?");
        assert_eq!(input.cursor(), "What can you do?".len());
    }

    #[test]
    fn test_visual_lines_hard_wrap_and_newlines() {
        assert_eq!(visual_lines("", 10), vec![0..0]);
        assert_eq!(visual_lines("abcdefg", 3), vec![0..3, 3..6, 6..7]);
        assert_eq!(visual_lines("ab\ncd", 10), vec![0..2, 3..5]);
        assert_eq!(visual_lines("ab\n", 10), vec![0..2, 3..3]);
        // Wide characters take two cells
        assert_eq!(visual_lines("日本語", 4), vec![0..6, 6..9]);
    }

    #[test]
    fn test_vertical_movement_keeps_column() {
        let mut input = typed("hello\nhi\nworld");
        input.handle_event(&TuiEvent::CursorUp);
        // "world" col 5 → "hi" clamps to end
        assert_eq!(input.cursor(), "hello\nhi".len());
        input.handle_event(&TuiEvent::CursorUp);
        assert_eq!(input.cursor(), 2);
        assert_eq!(input.handle_event(&TuiEvent::CursorUp), None);
        input.handle_event(&TuiEvent::CursorDown);
        assert_eq!(input.cursor(), "hello\n".len() + 2);
    }

    #[test]
    fn test_home_end_stay_on_logical_line() {
        let mut input = typed("one\ntwo");
        input.handle_event(&TuiEvent::CursorHome);
        assert_eq!(input.cursor(), 4);
        input.handle_event(&TuiEvent::CursorEnd);
        assert_eq!(input.cursor(), 7);
    }

    #[test]
    fn test_height_is_clamped() {
        let input = typed("1\n2\n3\n4\n5\n6\n7");
        assert_eq!(input.calculate_height(40), MAX_VISIBLE_LINES + VERTICAL_OVERHEAD);
        assert_eq!(InputBox::new().calculate_height(40), 1 + VERTICAL_OVERHEAD);
    }

    #[test]
    fn test_render_shows_title_and_text() {
        let backend = TestBackend::new(40, 3);
        let mut terminal = Terminal::new(backend).unwrap();
        let mut input = typed("hello there");
        input.attachments = 2;

        terminal.draw(|f| input.render(f, f.area())).unwrap();

        let text = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>();
        assert!(text.contains("Message"));
        assert!(text.contains("hello there"));
    }
}
