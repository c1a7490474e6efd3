//! # Placeholder Component
//!
//! Shown in place of the message list when a conversation has nothing to
//! display yet: the app's name and description, its opening statement, the
//! suggested starter questions, and (while required fields are empty) the
//! app's input form.
//!
//! The form follows the persistent state + transient wrapper pattern:
//! `FormState` lives in `TuiState` and is rebuilt whenever the app
//! parameters or the conversation change.

use std::collections::HashMap;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use crate::api::{AppInfo, AppParameters, UserInputFormItem};
use crate::core::form;
use crate::tui::component::Component;
use crate::tui::event::TuiEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Paragraph,
    Number,
    Select,
}

/// One editable form control.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldState {
    pub variable: String,
    pub label: String,
    pub required: bool,
    pub kind: FieldKind,
    pub options: Vec<String>,
    pub max_length: Option<u32>,
    pub value: String,
}

impl FieldState {
    fn accepts(&self, c: char) -> bool {
        if self
            .max_length
            .is_some_and(|max| self.value.chars().count() >= max as usize)
        {
            return false;
        }
        match self.kind {
            FieldKind::Number => c.is_ascii_digit() || c == '.' || c == '-',
            FieldKind::Text => c != '\n',
            FieldKind::Paragraph => true,
            FieldKind::Select => false,
        }
    }

    fn cycle_option(&mut self, forward: bool) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len();
        let next = match self.options.iter().position(|o| *o == self.value) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        self.value = self.options[next].clone();
    }
}

/// Events emitted by the input form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// User confirmed the form; values keyed by variable name
    Submit(HashMap<String, String>),
}

/// Persistent state for the input form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    pub fields: Vec<FieldState>,
    pub focused: usize,
}

impl FormState {
    /// Build the form from the app's declared inputs, pre-filled with
    /// defaults and anything already entered.
    pub fn new(parameters: Option<&AppParameters>, inputs: &HashMap<String, String>) -> Self {
        let values: HashMap<String, String> =
            form::initial_values(parameters, inputs).into_iter().collect();
        let fields = parameters
            .map(|p| {
                p.user_input_form
                    .iter()
                    .map(|item| {
                        let field = item.field();
                        let (kind, options) = match item {
                            UserInputFormItem::TextInput(_) => (FieldKind::Text, vec![]),
                            UserInputFormItem::Paragraph(_) => (FieldKind::Paragraph, vec![]),
                            UserInputFormItem::Number(_) => (FieldKind::Number, vec![]),
                            UserInputFormItem::Select(s) => (FieldKind::Select, s.options.clone()),
                        };
                        FieldState {
                            variable: field.variable.clone(),
                            label: field.label.clone(),
                            required: field.required,
                            kind,
                            options,
                            max_length: field.max_length,
                            value: values.get(&field.variable).cloned().unwrap_or_default(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { fields, focused: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn values(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .map(|f| (f.variable.clone(), f.value.clone()))
            .collect()
    }

    pub fn handle_event(&mut self, event: &TuiEvent) -> Option<FormEvent> {
        if self.fields.is_empty() {
            return matches!(event, TuiEvent::Submit).then(|| FormEvent::Submit(HashMap::new()));
        }
        let count = self.fields.len();
        let field = &mut self.fields[self.focused.min(count - 1)];

        match event {
            TuiEvent::NextSuggestion | TuiEvent::CursorDown => {
                self.focused = (self.focused + 1) % count;
                None
            }
            TuiEvent::CursorUp => {
                self.focused = (self.focused + count - 1) % count;
                None
            }
            TuiEvent::CursorLeft if field.kind == FieldKind::Select => {
                field.cycle_option(false);
                None
            }
            TuiEvent::CursorRight if field.kind == FieldKind::Select => {
                field.cycle_option(true);
                None
            }
            TuiEvent::InputChar(' ') if field.kind == FieldKind::Select => {
                field.cycle_option(true);
                None
            }
            TuiEvent::InputChar(c) => {
                if field.accepts(*c) {
                    field.value.push(*c);
                }
                None
            }
            TuiEvent::Paste(text) => {
                for c in text.chars() {
                    if field.accepts(c) {
                        field.value.push(c);
                    }
                }
                None
            }
            TuiEvent::Backspace => {
                if field.kind != FieldKind::Select {
                    field.value.pop();
                }
                None
            }
            TuiEvent::Submit => Some(FormEvent::Submit(self.values())),
            _ => None,
        }
    }
}

/// Stateless intro screen; borrows the form when one is shown.
pub struct Placeholder<'a> {
    pub app_info: Option<&'a AppInfo>,
    pub parameters: Option<&'a AppParameters>,
    pub form: Option<&'a FormState>,
    /// Error from the last submit attempt (e.g. missing fields)
    pub error: Option<&'a str>,
}

impl<'a> Placeholder<'a> {
    pub fn new(
        app_info: Option<&'a AppInfo>,
        parameters: Option<&'a AppParameters>,
        form: Option<&'a FormState>,
        error: Option<&'a str>,
    ) -> Self {
        Self {
            app_info,
            parameters,
            form,
            error,
        }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let dim = Style::default().fg(Color::DarkGray);

        let name = self
            .app_info
            .map(|i| i.name.clone())
            .unwrap_or_else(|| String::from("Dify Chat"));
        lines.push(Line::from(Span::styled(
            name,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        if let Some(info) = self.app_info
            && !info.description.is_empty()
        {
            lines.push(Line::from(Span::styled(info.description.clone(), dim)));
        }
        lines.push(Line::from(""));

        if let Some(params) = self.parameters
            && !params.opening_statement.trim().is_empty()
        {
            for line in params.opening_statement.trim().lines() {
                lines.push(Line::from(line.to_string()));
            }
            lines.push(Line::from(""));
        }

        if let Some(form) = self.form {
            for (i, field) in form.fields.iter().enumerate() {
                let focused = i == form.focused;
                let marker = if focused { "› " } else { "  " };
                let label = if field.required {
                    format!("{}*: ", field.label)
                } else {
                    format!("{}: ", field.label)
                };
                let value = match (field.kind, focused) {
                    (FieldKind::Select, _) if field.value.is_empty() => String::from("‹ choose ›"),
                    (FieldKind::Select, _) => format!("‹ {} ›", field.value),
                    (_, true) => format!("{}▏", field.value.replace('\n', " ⏎ ")),
                    (_, false) => field.value.replace('\n', " ⏎ "),
                };
                let style = if focused {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                lines.push(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(label, style),
                    Span::raw(value),
                ]));
            }
            if let Some(error) = self.error {
                lines.push(Line::from(Span::styled(
                    error.to_string(),
                    Style::default().fg(Color::Red),
                )));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Tab/↑↓ switch field · ←→ choose option · Enter start chat",
                dim,
            )));
        } else if let Some(params) = self.parameters
            && !params.suggested_questions.is_empty()
        {
            lines.push(Line::from(Span::styled("Try asking:", dim)));
            for question in &params.suggested_questions {
                lines.push(Line::from(format!("  • {question}")));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Tab fills a suggestion", dim)));
        }
        lines
    }
}

impl Component for Placeholder<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let lines = self.lines();
        let height = (lines.len() as u16).min(area.height);
        let [center] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        let [center] = Layout::horizontal([Constraint::Max(72)])
            .flex(Flex::Center)
            .areas(center);

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, center);
    }
}
