//! Render-time chat messages.
//!
//! Both hydrated history and the messages of the current session end up as
//! [`ChatMessage`] values, so the view renders one list without caring where
//! an entry came from.

use crate::api::{AgentThought, FileAttachment, MessageFile, Rating, RetrieverResource};
use crate::core::think::{ThinkingSplit, split_streaming, split_thinking};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Sent by this client, not yet confirmed by a history fetch.
    Local,
    /// Answer still streaming.
    Loading,
    Success,
    Error,
}

/// Files shown under a message: either what the user attached this session,
/// or what the server reports in history and `message_file` events.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageAttachment {
    Outgoing(FileAttachment),
    Server(MessageFile),
}

impl MessageAttachment {
    pub fn label(&self) -> String {
        match self {
            MessageAttachment::Outgoing(f) => f.describe(),
            MessageAttachment::Server(f) if !f.url.is_empty() => f.url.clone(),
            MessageAttachment::Server(f) => f.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    /// Displayable text. For AI messages this never contains think blocks.
    pub content: String,
    pub thinking: Option<String>,
    pub status: MessageStatus,
    pub error: String,
    pub files: Vec<MessageAttachment>,
    pub retriever_resources: Vec<RetrieverResource>,
    pub agent_thoughts: Vec<AgentThought>,
    pub feedback: Option<Rating>,
    /// `YYYY-MM-DD HH:MM:SS`, present for hydrated history.
    pub created_at: Option<String>,
    pub is_history: bool,
}

impl ChatMessage {
    fn blank(id: String, role: Role, status: MessageStatus) -> Self {
        Self {
            id,
            role,
            content: String::new(),
            thinking: None,
            status,
            error: String::new(),
            files: Vec::new(),
            retriever_resources: Vec::new(),
            agent_thoughts: Vec::new(),
            feedback: None,
            created_at: None,
            is_history: false,
        }
    }

    /// A user message sent during this session.
    pub fn local_user(id: String, content: String, files: Vec<FileAttachment>) -> Self {
        Self {
            content,
            files: files.into_iter().map(MessageAttachment::Outgoing).collect(),
            ..Self::blank(id, Role::User, MessageStatus::Local)
        }
    }

    /// Empty AI message waiting for streamed tokens.
    pub fn pending_ai(id: String) -> Self {
        Self::blank(id, Role::Ai, MessageStatus::Loading)
    }

    pub fn is_ai(&self) -> bool {
        self.role == Role::Ai
    }

    /// Replace content and thinking from the raw (possibly partial) answer.
    pub fn set_raw_answer(&mut self, raw: &str) {
        let ThinkingSplit { content, thinking } = split_streaming(raw);
        self.content = content;
        self.thinking = thinking;
    }

    /// Split the finished answer the way history hydration will.
    pub fn finish_answer(&mut self, raw: &str) {
        let ThinkingSplit { content, thinking } = split_thinking(raw);
        self.content = content;
        self.thinking = thinking;
    }

    /// Insert or update an agent thought by id, keeping them ordered by position.
    pub fn upsert_thought(&mut self, thought: AgentThought) {
        match self.agent_thoughts.iter_mut().find(|t| t.id == thought.id) {
            Some(existing) => *existing = thought,
            None => self.agent_thoughts.push(thought),
        }
        self.agent_thoughts.sort_by_key(|t| t.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thought(id: &str, position: u32, text: &str) -> AgentThought {
        AgentThought {
            id: id.to_string(),
            position,
            thought: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_raw_answer_splits_thinking() {
        let mut msg = ChatMessage::pending_ai("m".into());
        msg.set_raw_answer("<think>hmm</think>Yes");
        assert_eq!(msg.content, "Yes");
        assert_eq!(msg.thinking.as_deref(), Some("hmm"));

        msg.set_raw_answer("No thinking");
        assert_eq!(msg.thinking, None);
    }

    #[test]
    fn test_upsert_thought_replaces_and_orders() {
        let mut msg = ChatMessage::pending_ai("m".into());
        msg.upsert_thought(thought("b", 2, "second"));
        msg.upsert_thought(thought("a", 1, "first"));
        msg.upsert_thought(thought("b", 2, "second, updated"));
        assert_eq!(msg.agent_thoughts.len(), 2);
        assert_eq!(msg.agent_thoughts[0].id, "a");
        assert_eq!(msg.agent_thoughts[1].thought, "second, updated");
    }

    #[test]
    fn test_local_user_wraps_outgoing_files() {
        let msg = ChatMessage::local_user(
            "u".into(),
            "look".into(),
            vec![FileAttachment::remote("https://img")],
        );
        assert_eq!(msg.status, MessageStatus::Local);
        assert_eq!(msg.files[0].label(), "https://img");
    }
}
