use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::core::state::App;
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{
    AppPicker, ConversationPicker, MessageList, Placeholder, TitleBar,
};

/// What the main area shows for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainView {
    /// Required input-form fields are still empty
    Form,
    Loading,
    /// Nothing to show yet: intro and starter questions
    Empty,
    Messages,
}

pub fn main_view(app: &App) -> MainView {
    if app.init_loading {
        MainView::Loading
    } else if app.app_parameters.is_some() && !app.is_form_filled() {
        MainView::Form
    } else if app.render_message_count() == 0 {
        MainView::Empty
    } else {
        MainView::Messages
    }
}

/// Suggestions offered on Tab: follow-ups for the last answer, or the app's
/// starter questions while the conversation is empty.
pub fn current_suggestions(app: &App) -> &[String] {
    if !app.next_suggestions.is_empty() {
        return &app.next_suggestions;
    }
    match &app.app_parameters {
        Some(params) if app.render_message_count() == 0 && app.chat_ready() => {
            params.suggested_questions.as_slice()
        }
        _ => &[],
    }
}

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    use Constraint::{Length, Min};

    let view = main_view(app);
    let error_height = u16::from(app.error.is_some() && view != MainView::Form);
    let suggestions = current_suggestions(app);
    let suggestion_height = u16::from(!suggestions.is_empty() && view != MainView::Form);
    let input_height = tui.input_box.calculate_height(frame.area().width);

    let [title_area, main_area, error_area, suggestion_area, input_area] = Layout::vertical([
        Length(1),
        Min(0),
        Length(error_height),
        Length(suggestion_height),
        Length(input_height),
    ])
    .areas(frame.area());

    match view {
        MainView::Messages => {
            let messages = app.render_messages().collect();
            MessageList::new(
                &mut tui.message_list,
                messages,
                app.is_requesting,
                tui.pulse_value,
            )
            .render(frame, main_area);
        }
        MainView::Loading => {
            tui.message_list.viewport = Rect::default();
            let text = Paragraph::new(Line::from(Span::styled(
                "Loading conversation...",
                Style::default().fg(Color::DarkGray),
            )))
            .centered();
            let [center] = Layout::vertical([Length(1)])
                .flex(ratatui::layout::Flex::Center)
                .areas(main_area);
            frame.render_widget(text, center);
        }
        MainView::Form | MainView::Empty => {
            tui.message_list.viewport = Rect::default();
            let form = (view == MainView::Form).then_some(&tui.form);
            let error = if view == MainView::Form {
                app.error.as_deref()
            } else {
                None
            };
            Placeholder::new(app.app_info.as_ref(), app.app_parameters.as_ref(), form, error)
                .render(frame, main_area);
        }
    }

    let has_unseen = view == MainView::Messages && tui.message_list.has_unseen_content();
    TitleBar::new(
        app.app_name().to_string(),
        app.conversations
            .active()
            .map(|c| c.display_name().to_string()),
        app.status_message.clone(),
        has_unseen,
    )
    .render(frame, title_area);

    if let Some(error) = &app.error
        && error_height > 0
    {
        frame.render_widget(
            Line::from(Span::styled(
                format!("⚠ {error}"),
                Style::default().fg(Color::Red),
            )),
            error_area,
        );
    }

    if suggestion_height > 0 {
        let mut spans = vec![Span::styled(
            "Tab ▸ ",
            Style::default().fg(Color::DarkGray),
        )];
        for (i, suggestion) in suggestions.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" · ", Style::default().fg(Color::DarkGray)));
            }
            spans.push(Span::styled(
                suggestion.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            ));
        }
        frame.render_widget(Line::from(spans), suggestion_area);
    }

    if view != MainView::Form {
        tui.input_box.render(frame, input_area);
    }

    // Overlays render last so they sit on top
    if let Some(state) = tui.conversations.as_mut() {
        ConversationPicker::new(
            state,
            &app.conversations.items,
            app.active_conversation_id(),
        )
        .render(frame, frame.area());
    } else if let Some(state) = tui.app_picker.as_mut() {
        AppPicker::new(state, tui.current_app_id.as_deref()).render(frame, frame.area());
    }
}
