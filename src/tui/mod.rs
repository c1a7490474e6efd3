//! # TUI Adapter
//!
//! Terminal front end for the chat page. Key presses become `core::Action`s,
//! the reducer's effects run as tokio tasks, and their results come back as
//! actions through a channel drained by the event loop.
//!
//! Nothing outside `tui` depends on ratatui or crossterm.
//!
//! ## Redraw Strategy
//!
//! - **Animating** (answer streaming, history loading): draws every ~80ms so
//!   the streaming border can pulse.
//! - **Idle**: sleeps up to 500ms, only redraws on events, background
//!   actions, or terminal resize.
//!
//! The cursor is a steady block: a blinking one restarts its blink on every
//! redraw and flickers while an answer streams.

mod component;
mod components;
mod effects;
mod event;
mod ui;

use std::io::stdout;
use std::sync::{Arc, mpsc};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use log::{debug, info, warn};
use tokio::task::AbortHandle;

use crate::api::{ChatApi, DifyApi, Rating};
use crate::core::action::{Action, update};
use crate::core::app_store::DifyAppItem;
use crate::core::state::App;
use crate::tui::component::EventHandler;
use crate::tui::components::{
    AppPickerEvent, AppPickerState, ConversationEvent, ConversationListState, FormEvent,
    FormState, InputBox, InputEvent, MessageListState,
};
use crate::tui::effects::{Dispatcher, EffectRunner, Envelope, Flow, spawn_boot};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};
use crate::tui::ui::MainView;

/// Which keys go to the input box and which drive the message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Navigate messages with arrow keys; Space toggles thinking, +/-/0 rate
    /// the selected answer. Typing auto-switches to Input.
    Cursor,
    /// Keys edit the draft message; Esc leaves for Cursor.
    Input,
}

/// Screen state that the reducer never sees.
pub struct TuiState {
    // Persistent component states
    pub message_list: MessageListState,
    pub input_box: InputBox,
    pub form: FormState,
    // Modal input mode
    pub input_mode: InputMode,
    // Animation state
    pub pulse_value: f32,
    /// Next suggestion Tab will fill in
    pub suggestion_index: usize,
    // Overlays (None = hidden)
    pub conversations: Option<ConversationListState>,
    pub app_picker: Option<AppPickerState>,
    /// App store id of the app being shown (multi-app mode)
    pub current_app_id: Option<String>,
    /// Conversation the message list state belongs to
    shown_conversation: Option<String>,
    /// (conversation, form variables) the form was built for
    form_key: Option<(Option<String>, Option<Vec<String>>)>,
}

impl TuiState {
    pub fn new(current_app_id: Option<String>) -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            form: FormState::default(),
            input_mode: InputMode::Input, // User expects to type immediately
            pulse_value: 0.0,
            suggestion_index: 0,
            conversations: None,
            app_picker: None,
            current_app_id,
            shown_conversation: None,
            form_key: None,
        }
    }

    /// Reset view state that belongs to a conversation when the active one
    /// changes, and rebuild the input form when its inputs might differ.
    fn sync_with_app(&mut self, app: &App) {
        let active = app.active_conversation_id().map(str::to_string);
        if self.shown_conversation != active {
            self.message_list = MessageListState::new();
            self.suggestion_index = 0;
            self.shown_conversation = active.clone();
        }

        let variables = app
            .app_parameters
            .as_ref()
            .map(|p| p.user_input_form.iter().map(|i| i.variable().to_string()).collect());
        let key = (active, variables);
        if self.form_key.as_ref() != Some(&key) {
            self.form = FormState::new(app.app_parameters.as_ref(), &app.input_params);
            self.form_key = Some(key);
        }

        self.input_box.is_requesting = app.is_requesting;
        self.input_box.attachments = app.pending_files.len();

        if let Some(overlay) = self.conversations.as_mut() {
            overlay.clamp(app.conversations.items.len());
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol allows Shift+Enter detection; terminals
        // without it ignore the request
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, steady block cursor, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Startup options for the chat UI.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub conversation_limit: Option<u32>,
    /// Conversation to open instead of the most recent one
    pub initial_conversation: Option<String>,
    /// Apps offered by the Ctrl+A picker (empty in single-app mode)
    pub apps: Vec<DifyAppItem>,
    pub current_app_id: Option<String>,
}

/// What the event loop should do after handling an event.
#[derive(Debug)]
enum LoopSignal {
    Continue,
    Quit,
    SwitchApp(DifyAppItem),
}

/// Everything bound to the Dify app currently on screen.
struct Session {
    app: App,
    runner: EffectRunner,
    boot: AbortHandle,
}

impl Session {
    fn start(
        api: Arc<dyn ChatApi>,
        tx: &mpsc::Sender<Envelope>,
        generation: u64,
        options: &RunOptions,
        initial_conversation: Option<String>,
    ) -> Self {
        let mut app = App::new(api.clone());
        app.conversation_limit = options.conversation_limit;
        let runner = EffectRunner::new(api.clone(), Dispatcher::new(tx.clone(), generation));
        let boot = spawn_boot(
            api,
            runner.dispatcher().clone(),
            options.conversation_limit,
            initial_conversation,
        );
        Self { app, runner, boot }
    }

    fn stop(&mut self) {
        self.boot.abort();
        self.runner.abort_request();
    }
}

pub fn run(api: Arc<dyn ChatApi>, options: RunOptions) -> std::io::Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut generation = 0u64;
    let mut session = Session::start(
        api,
        &tx,
        generation,
        &options,
        options.initial_conversation.clone(),
    );
    let mut tui = TuiState::new(options.current_app_id.clone());

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    let start_time = std::time::Instant::now();
    let mut needs_redraw = true;

    'main: loop {
        tui.sync_with_app(&session.app);

        let animating = session.app.is_requesting || session.app.init_loading;
        if animating {
            needs_redraw = true;
        }

        if needs_redraw {
            let elapsed = start_time.elapsed().as_secs_f32();
            tui.pulse_value = (elapsed * 5.0).sin() * 0.5 + 0.5;
            terminal.draw(|f| ui::draw_ui(f, &session.app, &mut tui))?;
            needs_redraw = false;
        }

        // Poll faster while something pulses
        let timeout = if animating {
            std::time::Duration::from_millis(80)
        } else {
            std::time::Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Handle everything already queued before drawing again
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            let signal = handle_event(
                event,
                &mut session.app,
                &mut tui,
                &mut session.runner,
                &options.apps,
            );
            match signal {
                LoopSignal::Continue => {}
                LoopSignal::Quit => break 'main,
                LoopSignal::SwitchApp(item) => {
                    let user = session.app.user().to_string();
                    match DifyApi::new(item.api_options(&user)) {
                        Ok(api) => {
                            info!("Switching to app {} ({})", item.info.name, item.id);
                            session.stop();
                            generation += 1;
                            session = Session::start(Arc::new(api), &tx, generation, &options, None);
                            tui = TuiState::new(Some(item.id));
                        }
                        Err(e) => {
                            warn!("Cannot switch to app {}: {}", item.id, e);
                            session.app.error = Some(format!("Cannot open {}: {e}", item.info.name));
                        }
                    }
                    tui.sync_with_app(&session.app);
                }
            }
            tui.sync_with_app(&session.app);
        }

        // Handle background task actions
        while let Ok(envelope) = rx.try_recv() {
            if envelope.generation != session.runner.dispatcher().generation() {
                debug!("Dropping action from a previous app: {:?}", envelope.action);
                continue;
            }
            needs_redraw = true;
            if dispatch(&mut session.app, &mut tui, &mut session.runner, envelope.action)
                == Flow::Quit
            {
                break 'main;
            }
        }
    }

    session.stop();
    ratatui::restore();
    Ok(())
}

/// Apply an action to the app and run the effects it produced.
fn dispatch(app: &mut App, tui: &mut TuiState, runner: &mut EffectRunner, action: Action) -> Flow {
    // Streamed tokens only grow the last message; anything else may
    // replace messages wholesale
    if !matches!(action, Action::Stream { .. }) {
        tui.message_list.layout.invalidate();
    }
    let effects = update(app, action);
    let flow = runner.run(app, effects);
    tui.sync_with_app(app);
    flow
}

fn flow_signal(flow: Flow) -> LoopSignal {
    match flow {
        Flow::Continue => LoopSignal::Continue,
        Flow::Quit => LoopSignal::Quit,
    }
}

fn handle_event(
    event: TuiEvent,
    app: &mut App,
    tui: &mut TuiState,
    runner: &mut EffectRunner,
    apps: &[DifyAppItem],
) -> LoopSignal {
    match event {
        // Resize just needs a redraw
        TuiEvent::Resize => return LoopSignal::Continue,
        // Ctrl+C quits from anywhere
        TuiEvent::ForceQuit => return flow_signal(dispatch(app, tui, runner, Action::Quit)),
        _ => {}
    }

    // When an overlay is open, route all events to it
    if let Some(overlay) = tui.conversations.as_mut() {
        let Some(conversation_event) = overlay.handle_event(&event, &app.conversations.items)
        else {
            return LoopSignal::Continue;
        };
        let action = match conversation_event {
            ConversationEvent::Open(id) => {
                tui.conversations = None;
                Action::SelectConversation(id)
            }
            ConversationEvent::CreateNew => {
                tui.conversations = None;
                Action::NewConversation
            }
            ConversationEvent::Rename { id, name } => Action::RenameConversation {
                conversation_id: id,
                name,
            },
            ConversationEvent::Delete(id) => Action::DeleteConversation(id),
            ConversationEvent::Dismiss => {
                tui.conversations = None;
                return LoopSignal::Continue;
            }
        };
        return flow_signal(dispatch(app, tui, runner, action));
    }
    if let Some(picker) = tui.app_picker.as_mut() {
        return match picker.handle_event(&event) {
            Some(AppPickerEvent::Select(item)) => {
                tui.app_picker = None;
                if tui.current_app_id.as_deref() == Some(item.id.as_str()) {
                    LoopSignal::Continue
                } else {
                    LoopSignal::SwitchApp(item)
                }
            }
            Some(AppPickerEvent::Dismiss) => {
                tui.app_picker = None;
                LoopSignal::Continue
            }
            None => LoopSignal::Continue,
        };
    }

    match event {
        TuiEvent::OpenConversations => {
            tui.conversations = Some(ConversationListState::new(
                &app.conversations.items,
                app.active_conversation_id(),
            ));
            // Refresh in the background so names generated server-side show up
            let flow = runner.run(app, vec![crate::core::action::Effect::FetchConversations]);
            return flow_signal(flow);
        }
        TuiEvent::OpenAppPicker => {
            if apps.is_empty() {
                app.status_message = String::from("App switching needs multi-app mode");
            } else {
                tui.app_picker = Some(AppPickerState::new(
                    apps.to_vec(),
                    tui.current_app_id.as_deref(),
                ));
            }
            return LoopSignal::Continue;
        }
        TuiEvent::NewConversation => {
            return flow_signal(dispatch(app, tui, runner, Action::NewConversation));
        }
        // Mouse hover selects the message under the pointer
        TuiEvent::MouseMove(_col, row) => {
            tui.message_list.selected_index = tui.message_list.hit_test(row);
            return LoopSignal::Continue;
        }
        // Click toggles the thinking section of the message
        TuiEvent::MouseClick(_col, row) => {
            if let Some(idx) = tui.message_list.hit_test(row) {
                tui.message_list.selected_index = Some(idx);
                if app.render_messages().nth(idx).is_some_and(|m| m.thinking.is_some()) {
                    tui.message_list.toggle_thinking(idx);
                }
            }
            return LoopSignal::Continue;
        }
        // Scroll events always go to MessageList regardless of mode
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown => {
            tui.message_list.handle_event(&event);
            return LoopSignal::Continue;
        }
        _ => {}
    }

    // The input form replaces the chat box until it is filled
    if ui::main_view(app) == MainView::Form {
        if let Some(FormEvent::Submit(values)) = tui.form.handle_event(&event) {
            return flow_signal(dispatch(app, tui, runner, Action::StartConversation(values)));
        }
        return LoopSignal::Continue;
    }

    // Esc while an answer streams cancels it, in either mode
    if matches!(event, TuiEvent::Escape) && app.is_requesting {
        return flow_signal(dispatch(app, tui, runner, Action::Cancel));
    }

    if matches!(event, TuiEvent::NextSuggestion) {
        let suggestions = ui::current_suggestions(app);
        if !suggestions.is_empty() {
            let text = suggestions[tui.suggestion_index % suggestions.len()].clone();
            tui.suggestion_index += 1;
            tui.input_box.set_text(&text);
            tui.input_mode = InputMode::Input;
            tui.message_list.selected_index = None;
        }
        return LoopSignal::Continue;
    }

    match tui.input_mode {
        InputMode::Input => {
            if matches!(event, TuiEvent::Escape) {
                tui.input_mode = InputMode::Cursor;
                let count = app.render_message_count();
                tui.message_list.selected_index = count.checked_sub(1);
                return LoopSignal::Continue;
            }
            if let Some(InputEvent::Submit(text)) = tui.input_box.handle_event(&event) {
                tui.suggestion_index = 0;
                return flow_signal(dispatch(app, tui, runner, Action::Submit(text)));
            }
            LoopSignal::Continue
        }
        InputMode::Cursor => handle_cursor_event(event, app, tui, runner),
    }
}

fn handle_cursor_event(
    event: TuiEvent,
    app: &mut App,
    tui: &mut TuiState,
    runner: &mut EffectRunner,
) -> LoopSignal {
    let count = app.render_message_count();
    match event {
        TuiEvent::InputChar(' ') => {
            if let Some(idx) = tui.message_list.selected_index
                && app.render_messages().nth(idx).is_some_and(|m| m.thinking.is_some())
            {
                tui.message_list.toggle_thinking(idx);
            }
        }
        TuiEvent::InputChar(c @ ('+' | '-' | '0')) => {
            let selected = tui
                .message_list
                .selected_index
                .and_then(|idx| app.render_messages().nth(idx))
                .filter(|m| m.is_ai())
                .map(|m| m.id.clone());
            if let Some(message_id) = selected {
                let rating = match c {
                    '+' => Some(Rating::Like),
                    '-' => Some(Rating::Dislike),
                    _ => None,
                };
                return flow_signal(dispatch(
                    app,
                    tui,
                    runner,
                    Action::Feedback { message_id, rating },
                ));
            }
        }
        // Typing goes back to the input box
        TuiEvent::InputChar(_) | TuiEvent::Paste(_) => {
            tui.input_mode = InputMode::Input;
            tui.message_list.selected_index = None;
            tui.input_box.handle_event(&event);
        }
        TuiEvent::Submit => {
            tui.input_mode = InputMode::Input;
            tui.message_list.selected_index = None;
        }
        TuiEvent::CursorUp if count > 0 => {
            let idx = tui
                .message_list
                .selected_index
                .map(|i| i.saturating_sub(1))
                .unwrap_or(count - 1);
            tui.message_list.selected_index = Some(idx);
            tui.message_list.scroll_to_selected();
        }
        TuiEvent::CursorDown => {
            if let Some(idx) = tui.message_list.selected_index
                && idx + 1 < count
            {
                tui.message_list.selected_index = Some(idx + 1);
                tui.message_list.scroll_to_selected();
            }
        }
        _ => {}
    }
    LoopSignal::Continue
}
