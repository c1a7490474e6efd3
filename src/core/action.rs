//! # Actions
//!
//! Everything that can happen in the chat becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! A streamed event arrives? That's `Action::Stream { request, event }`.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns the side effects the caller must run. No I/O here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Vec<Effect>
//! ```
//!
//! Effects that finish come back as new actions (`FetchHistory` →
//! `HistoryLoaded`), so the whole request lifecycle is replayable in tests.

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::api::{
    AppInfo, AppMeta, AppParameters, ChatEvent, ConversationItem, FeedbackRequest,
    FileAttachment, MessageItem, Rating, RenameConversationRequest, SendMessageRequest,
    UploadedFile, types::ResponseMode,
};
use crate::core::conversation::is_temp_id;
use crate::core::form;
use crate::core::history::hydrate;
use crate::core::message::{ChatMessage, MessageAttachment, MessageStatus};
use crate::core::state::App;

/// Prefix of message ids generated client-side before the server assigns one.
pub const LOCAL_ID_PREFIX: &str = "local_";

fn new_local_id() -> String {
    format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

#[derive(Debug)]
pub enum Action {
    // Boot
    AppLoaded {
        info: AppInfo,
        meta: Option<AppMeta>,
        parameters: AppParameters,
    },
    LoadFailed(String),
    ConversationsLoaded(Vec<ConversationItem>),

    // Conversations
    SelectConversation(String),
    NewConversation,
    /// Input-form values confirmed in the placeholder.
    StartConversation(HashMap<String, String>),
    HistoryLoaded {
        conversation_id: String,
        items: Vec<MessageItem>,
    },
    RenameConversation {
        conversation_id: String,
        name: String,
    },
    ConversationRenamed {
        conversation_id: String,
        name: String,
    },
    DeleteConversation(String),
    ConversationDeleted(String),

    // Chat turn
    Submit(String),
    /// Results of request number `request`; stale numbers are ignored.
    Stream {
        request: u64,
        event: ChatEvent,
    },
    ResponseDone {
        request: u64,
    },
    ResponseFailed {
        request: u64,
        error: String,
    },
    Cancel,
    TaskStopped {
        conversation_id: String,
    },
    SuggestionsLoaded {
        message_id: String,
        suggestions: Vec<String>,
    },

    // Feedback and files
    Feedback {
        message_id: String,
        rating: Option<Rating>,
    },
    FeedbackSent {
        conversation_id: String,
    },
    FileUploaded(UploadedFile),
    UploadFailed(String),

    /// A background call failed; surfaced on the status line.
    RequestFailed(String),
    Quit,
}

/// Side effects requested by `update()`. The TUI runs them as tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Quit,
    /// Abort the in-flight streaming request, if any.
    AbortRequest,
    FetchConversations,
    FetchHistory(String),
    SendMessage {
        request: u64,
        body: SendMessageRequest,
    },
    FetchSuggestions(String),
    StopTask {
        task_id: String,
        conversation_id: String,
    },
    SendFeedback(FeedbackRequest),
    RenameConversation(RenameConversationRequest),
    DeleteConversation(String),
    UploadFile(PathBuf),
}

pub fn update(app: &mut App, action: Action) -> Vec<Effect> {
    match action {
        Action::AppLoaded {
            info,
            meta,
            parameters,
        } => {
            info!("App loaded: {}", info.name);
            app.app_info = Some(info);
            app.app_meta = meta;
            app.app_parameters = Some(parameters);
            app.status_message = String::from("Ready");
            vec![]
        }
        Action::LoadFailed(err) => {
            warn!("Loading app failed: {}", err);
            app.init_loading = false;
            app.status_message = String::from("Load failed");
            app.error = Some(err);
            vec![]
        }
        Action::ConversationsLoaded(items) => {
            let first = items.first().map(|c| c.id.clone());
            app.conversations.replace_from_server(items);
            if app.conversations.active_id.is_some() {
                return vec![];
            }
            match first {
                Some(id) => select_conversation(app, id),
                None => {
                    let id = app.conversations.add_temp();
                    select_conversation(app, id)
                }
            }
        }

        Action::SelectConversation(id) => select_conversation(app, id),
        Action::NewConversation => {
            app.input_params.clear();
            let existing_temp = app
                .conversations
                .items
                .iter()
                .find(|c| c.is_temp())
                .map(|c| c.id.clone());
            let id = existing_temp.unwrap_or_else(|| app.conversations.add_temp());
            select_conversation(app, id)
        }
        Action::StartConversation(values) => {
            app.input_params = values;
            if !app.is_form_filled() {
                let labels = form::unfilled_labels(app.app_parameters.as_ref(), &app.input_params);
                app.error = Some(form::missing_fields_message(&labels));
                return vec![];
            }
            app.error = None;
            if app.conversations.active_id.is_none() {
                let id = app.conversations.add_temp();
                return select_conversation(app, id);
            }
            vec![]
        }
        Action::HistoryLoaded {
            conversation_id,
            items,
        } => {
            if app.active_conversation_id() != Some(conversation_id.as_str()) {
                debug!("Dropping stale history for {}", conversation_id);
                return vec![];
            }
            app.init_loading = false;
            if items.is_empty() {
                return vec![];
            }
            let hydrated = hydrate(&items);
            if app.is_requesting {
                // The running turn is not in this history yet; keep it
                debug!("Request in flight, keeping streamed messages");
                app.history_messages = hydrated.messages;
                return vec![];
            }
            if let Some(inputs) = hydrated.inputs {
                app.input_params = inputs;
            }
            app.messages.clear();
            app.history_messages = hydrated.messages;
            vec![]
        }
        Action::RenameConversation {
            conversation_id,
            name,
        } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                app.error = Some(String::from("Conversation name must not be empty"));
                return vec![];
            }
            if is_temp_id(&conversation_id) {
                app.conversations.rename(&conversation_id, &name);
                return vec![];
            }
            vec![Effect::RenameConversation(RenameConversationRequest {
                conversation_id,
                name: Some(name),
                auto_generate: false,
            })]
        }
        Action::ConversationRenamed {
            conversation_id,
            name,
        } => {
            app.conversations.rename(&conversation_id, &name);
            app.status_message = format!("Renamed to {name}");
            vec![]
        }
        Action::DeleteConversation(id) => {
            if is_temp_id(&id) {
                return after_delete(app, &id);
            }
            vec![Effect::DeleteConversation(id)]
        }
        Action::ConversationDeleted(id) => after_delete(app, &id),

        Action::Submit(text) => submit(app, text),
        Action::Stream { request, event } => {
            if !is_current_request(app, request) {
                debug!("Ignoring stream event of request {}: {:?}", request, event);
                return vec![];
            }
            apply_stream_event(app, event)
        }
        Action::ResponseDone { request } => {
            if !is_current_request(app, request) {
                return vec![];
            }
            app.is_requesting = false;
            app.current_task_id = None;
            app.status_message = String::from("Ready");

            let mut effects = Vec::new();
            if let Some(ai) = streaming_message(&mut app.messages) {
                if !app.raw_answer.is_empty() {
                    ai.finish_answer(&app.raw_answer);
                }
                if ai.status == MessageStatus::Loading {
                    ai.status = MessageStatus::Success;
                }
                if ai.status == MessageStatus::Success
                    && !ai.id.starts_with(LOCAL_ID_PREFIX)
                    && app
                        .app_parameters
                        .as_ref()
                        .is_some_and(|p| p.suggested_questions_after_answer.enabled)
                {
                    effects.push(Effect::FetchSuggestions(ai.id.clone()));
                }
            }
            if std::mem::take(&mut app.conversation_created) {
                effects.push(Effect::FetchConversations);
            }
            effects
        }
        Action::ResponseFailed {
            request,
            error: err,
        } => {
            if !is_current_request(app, request) {
                return vec![];
            }
            warn!("Chat request failed: {}", err);
            app.is_requesting = false;
            app.current_task_id = None;
            app.status_message = String::from("Request failed");
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.status = MessageStatus::Error;
                ai.error = err;
            }
            if std::mem::take(&mut app.conversation_created) {
                return vec![Effect::FetchConversations];
            }
            vec![]
        }
        Action::Cancel => {
            if !app.is_requesting {
                return vec![];
            }
            info!("Cancelling request");
            app.is_requesting = false;
            app.status_message = String::from("Cancelled");
            if let Some(ai) = streaming_message(&mut app.messages)
                && ai.status == MessageStatus::Loading
            {
                ai.status = MessageStatus::Success;
            }

            let mut effects = vec![Effect::AbortRequest];
            let task_id = app.current_task_id.take();
            let conversation_id = app.active_conversation_id().map(str::to_string);
            if let (Some(task_id), Some(conversation_id)) = (task_id, conversation_id) {
                effects.push(Effect::StopTask {
                    task_id,
                    conversation_id,
                });
            }
            if std::mem::take(&mut app.conversation_created) {
                effects.push(Effect::FetchConversations);
            }
            effects
        }
        Action::TaskStopped { conversation_id } => {
            if app.active_conversation_id() == Some(conversation_id.as_str())
                && !is_temp_id(&conversation_id)
            {
                vec![Effect::FetchHistory(conversation_id)]
            } else {
                vec![]
            }
        }
        Action::SuggestionsLoaded {
            message_id,
            suggestions,
        } => {
            let latest = app.render_messages().filter(|m| m.is_ai()).last();
            if latest.is_some_and(|m| m.id == message_id) {
                app.next_suggestions = suggestions;
            }
            vec![]
        }

        Action::Feedback { message_id, rating } => {
            if message_id.starts_with(LOCAL_ID_PREFIX) {
                app.status_message = String::from("Message not saved yet");
                return vec![];
            }
            for msg in app
                .history_messages
                .iter_mut()
                .chain(app.messages.iter_mut())
                .filter(|m| m.is_ai() && m.id == message_id)
            {
                msg.feedback = rating;
            }
            vec![Effect::SendFeedback(FeedbackRequest {
                message_id,
                rating,
                content: String::new(),
            })]
        }
        Action::FeedbackSent { conversation_id } => {
            app.status_message = String::from("Feedback sent");
            if app.active_conversation_id() == Some(conversation_id.as_str()) {
                vec![Effect::FetchHistory(conversation_id)]
            } else {
                vec![]
            }
        }
        Action::FileUploaded(file) => {
            app.status_message = format!("Attached {}", file.name);
            app.pending_files.push(FileAttachment::uploaded(file.id));
            vec![]
        }
        Action::UploadFailed(err) => {
            app.status_message = String::from("Upload failed");
            app.error = Some(err);
            vec![]
        }

        Action::RequestFailed(err) => {
            warn!("Background request failed: {}", err);
            app.init_loading = false;
            app.error = Some(err);
            vec![]
        }
        Action::Quit => {
            if app.is_requesting {
                app.is_requesting = false;
                vec![Effect::AbortRequest, Effect::Quit]
            } else {
                vec![Effect::Quit]
            }
        }
    }
}

/// The AI message currently receiving tokens: always the last one pushed.
fn streaming_message(messages: &mut [ChatMessage]) -> Option<&mut ChatMessage> {
    messages.last_mut().filter(|m| m.is_ai())
}

fn select_conversation(app: &mut App, id: String) -> Vec<Effect> {
    if app.active_conversation_id() == Some(id.as_str()) {
        return vec![];
    }

    let mut effects = Vec::new();
    if app.is_requesting {
        app.is_requesting = false;
        app.current_task_id = None;
        effects.push(Effect::AbortRequest);
    }
    if std::mem::take(&mut app.conversation_created) {
        effects.push(Effect::FetchConversations);
    }

    info!("Selecting conversation {}", id);
    app.reset_conversation_view();
    app.conversations.active_id = Some(id.clone());

    if is_temp_id(&id) {
        app.init_loading = false;
    } else {
        app.init_loading = true;
        effects.push(Effect::FetchHistory(id));
    }
    effects
}

fn after_delete(app: &mut App, id: &str) -> Vec<Effect> {
    let was_active = app.active_conversation_id() == Some(id);
    app.conversations.remove(id);
    app.status_message = String::from("Conversation deleted");
    if !was_active {
        return vec![];
    }

    app.reset_conversation_view();
    let next = app.conversations.items.first().map(|c| c.id.clone());
    let next = next.unwrap_or_else(|| app.conversations.add_temp());
    select_conversation(app, next)
}

fn submit(app: &mut App, text: String) -> Vec<Effect> {
    if app.is_requesting {
        app.status_message = String::from("Waiting for the current answer");
        return vec![];
    }

    let trimmed = text.trim();
    if let Some(path) = trimmed.strip_prefix("/attach ") {
        app.status_message = String::from("Uploading...");
        return vec![Effect::UploadFile(PathBuf::from(path.trim()))];
    }
    if let Some(url) = trimmed.strip_prefix("/image ") {
        app.pending_files.push(FileAttachment::remote(url.trim()));
        app.status_message = format!("{} attachment(s)", app.pending_files.len());
        return vec![];
    }
    if trimmed == "/files clear" {
        app.pending_files.clear();
        app.status_message = String::from("Attachments cleared");
        return vec![];
    }

    if !app.is_form_filled() {
        let labels = form::unfilled_labels(app.app_parameters.as_ref(), &app.input_params);
        app.error = Some(form::missing_fields_message(&labels));
        return vec![];
    }

    let mut effects = Vec::new();
    if app.conversations.active_id.is_none() {
        let id = app.conversations.add_temp();
        effects.extend(select_conversation(app, id));
    }
    let Some(conversation_id) = app.active_conversation_id().map(str::to_string) else {
        return effects;
    };

    let files = std::mem::take(&mut app.pending_files);
    app.messages.push(ChatMessage::local_user(
        new_local_id(),
        text.clone(),
        files.clone(),
    ));
    app.messages.push(ChatMessage::pending_ai(new_local_id()));
    app.raw_answer.clear();
    app.next_suggestions.clear();
    app.current_task_id = None;
    app.conversation_created = false;
    app.is_requesting = true;
    app.error = None;
    app.status_message = String::from("Thinking...");

    app.request_seq += 1;

    effects.push(Effect::SendMessage {
        request: app.request_seq,
        body: SendMessageRequest {
            conversation_id: (!is_temp_id(&conversation_id)).then_some(conversation_id),
            inputs: app.input_params.clone(),
            files,
            user: app.user().to_string(),
            response_mode: ResponseMode::Streaming,
            query: text,
        },
    });
    effects
}

fn is_current_request(app: &App, request: u64) -> bool {
    app.is_requesting && request == app.request_seq
}

fn apply_stream_event(app: &mut App, event: ChatEvent) -> Vec<Effect> {
    if let Some((conversation_id, message_id, task_id)) = event.ids() {
        if !task_id.is_empty() {
            app.current_task_id = Some(task_id.to_string());
        }
        if let Some(active) = app.active_conversation_id().map(str::to_string)
            && is_temp_id(&active)
            && !conversation_id.is_empty()
            && app.conversations.promote(&active, conversation_id)
        {
            info!("Conversation {} assigned id {}", active, conversation_id);
            app.conversation_created = true;
        }
        if !message_id.is_empty()
            && let Some(ai) = streaming_message(&mut app.messages)
        {
            ai.id = message_id.to_string();
        }
    }

    match event {
        ChatEvent::Message(chunk) => {
            app.raw_answer.push_str(&chunk.answer);
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.set_raw_answer(&app.raw_answer);
            }
        }
        ChatEvent::MessageReplace(chunk) => {
            app.raw_answer = chunk.answer;
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.set_raw_answer(&app.raw_answer);
            }
        }
        ChatEvent::AgentThought(thought) => {
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.upsert_thought(thought);
            }
        }
        ChatEvent::MessageFile(file) => {
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.files.push(MessageAttachment::Server(file));
            }
        }
        ChatEvent::MessageEnd(end) => {
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.retriever_resources = end.metadata.retriever_resources;
                if ai.status == MessageStatus::Loading {
                    ai.status = MessageStatus::Success;
                }
            }
        }
        ChatEvent::Error(err) => {
            warn!("Stream error {} ({}): {}", err.status, err.code, err.message);
            if let Some(ai) = streaming_message(&mut app.messages) {
                ai.status = MessageStatus::Error;
                ai.error = err.message;
            }
        }
        ChatEvent::Ping | ChatEvent::Other(_) => {}
    }
    vec![]
}
