//! # Application State
//!
//! Core business state for the chat page. Domain logic only; presentation
//! state (scroll offsets, open overlays) lives in the `tui` module.
//!
//! ```text
//! App
//! ├── api: Arc<dyn ChatApi>              // the Dify app we talk to
//! ├── app_info / app_meta / parameters   // loaded at boot
//! ├── conversations: ConversationList    // list + active id
//! ├── history_messages: Vec<ChatMessage> // hydrated from GET /messages
//! ├── messages: Vec<ChatMessage>         // sent/streamed this session
//! ├── raw_answer: String                 // streamed answer incl. think tags
//! ├── input_params: HashMap              // input-form values
//! ├── pending_files: Vec<FileAttachment> // attached to the next message
//! ├── next_suggestions: Vec<String>
//! ├── is_requesting: bool                // one request at a time
//! ├── request_seq: u64                   // tags the running request's events
//! ├── current_task_id: Option<String>    // for stop-task
//! ├── init_loading: bool                 // history fetch in flight
//! ├── status_message / error
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::{AppInfo, AppMeta, AppParameters, ChatApi, FileAttachment};
use crate::core::conversation::ConversationList;
use crate::core::form;
use crate::core::message::ChatMessage;

pub struct App {
    pub api: Arc<dyn ChatApi>,
    pub app_info: Option<AppInfo>,
    pub app_meta: Option<AppMeta>,
    pub app_parameters: Option<AppParameters>,
    pub conversations: ConversationList,
    pub history_messages: Vec<ChatMessage>,
    pub messages: Vec<ChatMessage>,
    /// Raw text of the answer being streamed, think tags included.
    pub raw_answer: String,
    pub input_params: HashMap<String, String>,
    pub pending_files: Vec<FileAttachment>,
    pub next_suggestions: Vec<String>,
    pub is_requesting: bool,
    /// Sequence number of the latest request; older stream results are dropped.
    pub request_seq: u64,
    pub current_task_id: Option<String>,
    /// Set when the conversation of the running request got its server id.
    pub conversation_created: bool,
    pub init_loading: bool,
    pub status_message: String,
    pub error: Option<String>,
    /// Number of conversations requested from the server.
    pub conversation_limit: Option<u32>,
}

impl App {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            app_info: None,
            app_meta: None,
            app_parameters: None,
            conversations: ConversationList::default(),
            history_messages: Vec::new(),
            messages: Vec::new(),
            raw_answer: String::new(),
            input_params: HashMap::new(),
            pending_files: Vec::new(),
            next_suggestions: Vec::new(),
            is_requesting: false,
            request_seq: 0,
            current_task_id: None,
            conversation_created: false,
            init_loading: true,
            status_message: String::from("Loading app..."),
            error: None,
            conversation_limit: None,
        }
    }

    pub fn user(&self) -> &str {
        self.api.user()
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.conversations.active_id.as_deref()
    }

    pub fn is_form_filled(&self) -> bool {
        form::is_form_filled(self.app_parameters.as_ref(), &self.input_params)
    }

    /// The chat box is shown once the form is satisfied and a conversation is selected;
    /// otherwise the placeholder with the input form is shown.
    pub fn chat_ready(&self) -> bool {
        self.is_form_filled() && self.conversations.active_id.is_some()
    }

    pub fn app_name(&self) -> &str {
        self.app_info
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or("Dify Chat")
    }

    /// History followed by this session's messages: what the chat box renders.
    pub fn render_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history_messages.iter().chain(self.messages.iter())
    }

    pub fn render_message_count(&self) -> usize {
        self.history_messages.len() + self.messages.len()
    }

    pub fn suggestions_enabled(&self) -> bool {
        self.app_parameters
            .as_ref()
            .is_some_and(|p| p.suggested_questions_after_answer.enabled)
    }

    /// Clear everything tied to the displayed conversation.
    pub fn reset_conversation_view(&mut self) {
        self.history_messages.clear();
        self.messages.clear();
        self.raw_answer.clear();
        self.next_suggestions.clear();
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_app;

    #[test]
    fn test_app_new_defaults() {
        let app = test_app();
        assert_eq!(app.status_message, "Loading app...");
        assert!(!app.is_requesting);
        assert!(app.init_loading);
        assert_eq!(app.user(), "test-user");
        assert_eq!(app.app_name(), "Dify Chat");
    }

    #[test]
    fn test_chat_ready_needs_active_conversation() {
        let mut app = test_app();
        assert!(app.is_form_filled());
        assert!(!app.chat_ready());
        app.conversations.active_id = Some("c1".into());
        assert!(app.chat_ready());
    }
}
