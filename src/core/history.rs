//! History hydration: `GET /messages` items → render-time messages.

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::api::MessageItem;
use crate::core::message::{ChatMessage, MessageAttachment, MessageStatus, Role};
use crate::core::think::split_thinking;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of hydrating a conversation's history.
#[derive(Debug, Default)]
pub struct Hydrated {
    pub messages: Vec<ChatMessage>,
    /// Input values recorded with the conversation, when there are any.
    pub inputs: Option<HashMap<String, String>>,
}

/// Format unix seconds in the local timezone.
pub fn format_timestamp(secs: i64) -> String {
    format_timestamp_in(secs, &Local)
}

pub fn format_timestamp_in<Tz: TimeZone>(secs: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .with_timezone(tz)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

fn input_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Expand each history item into a user entry followed by an AI entry.
pub fn hydrate(items: &[MessageItem]) -> Hydrated {
    hydrate_with(items, format_timestamp)
}

pub fn hydrate_with(items: &[MessageItem], format: impl Fn(i64) -> String) -> Hydrated {
    let inputs = items
        .first()
        .filter(|first| !first.inputs.is_empty())
        .map(|first| {
            first
                .inputs
                .iter()
                .map(|(k, v)| (k.clone(), input_to_string(v)))
                .collect()
        });

    let mut messages = Vec::with_capacity(items.len() * 2);
    for item in items {
        let created_at = Some(format(item.created_at));
        let split = split_thinking(&item.answer);

        let (user_files, ai_files): (Vec<_>, Vec<_>) = item
            .message_files
            .iter()
            .cloned()
            .partition(|f| f.belongs_to != "assistant");

        messages.push(ChatMessage {
            id: item.id.clone(),
            role: Role::User,
            content: item.query.clone(),
            thinking: None,
            status: MessageStatus::Success,
            error: String::new(),
            files: user_files.into_iter().map(MessageAttachment::Server).collect(),
            retriever_resources: Vec::new(),
            agent_thoughts: Vec::new(),
            feedback: None,
            created_at: created_at.clone(),
            is_history: true,
        });

        messages.push(ChatMessage {
            id: item.id.clone(),
            role: Role::Ai,
            content: split.content,
            thinking: split.thinking,
            status: if item.status == "error" {
                MessageStatus::Error
            } else {
                MessageStatus::Success
            },
            error: item.error.clone().unwrap_or_default(),
            files: ai_files.into_iter().map(MessageAttachment::Server).collect(),
            retriever_resources: item.retriever_resources.clone(),
            agent_thoughts: item.agent_thoughts.clone(),
            feedback: item.feedback.as_ref().map(|f| f.rating),
            created_at,
            is_history: true,
        });
    }

    Hydrated { messages, inputs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Feedback, MessageFile, Rating};

    fn item(id: &str, query: &str, answer: &str, created_at: i64) -> MessageItem {
        MessageItem {
            id: id.to_string(),
            query: query.to_string(),
            answer: answer.to_string(),
            status: "normal".to_string(),
            created_at,
            ..Default::default()
        }
    }

    #[test]
    fn test_format_timestamp_in_utc() {
        assert_eq!(format_timestamp_in(0, &Utc), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp_in(1_700_000_000, &Utc), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_local_timestamp_has_fixed_shape() {
        let ts = format_timestamp(1_700_000_000);
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }

    #[test]
    fn test_each_item_becomes_user_then_ai() {
        let items = vec![item("m1", "hi", "hello", 0), item("m2", "again", "sure", 60)];
        let hydrated = hydrate_with(&items, |s| format_timestamp_in(s, &Utc));
        let roles: Vec<Role> = hydrated.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Ai, Role::User, Role::Ai]);
        assert_eq!(hydrated.messages[0].content, "hi");
        assert_eq!(hydrated.messages[1].content, "hello");
        assert_eq!(hydrated.messages[2].created_at.as_deref(), Some("1970-01-01 00:01:00"));
        assert_eq!(hydrated.messages[2].created_at, hydrated.messages[3].created_at);
        assert!(hydrated.messages.iter().all(|m| m.is_history));
    }

    #[test]
    fn test_ai_entry_strips_thinking() {
        let items = vec![item("m1", "q", "<think> reasoning </think>Answer", 0)];
        let hydrated = hydrate(&items);
        let ai = &hydrated.messages[1];
        assert_eq!(ai.content, "Answer");
        assert_eq!(ai.thinking.as_deref(), Some("reasoning"));
    }

    #[test]
    fn test_error_status_feedback_and_files_carry_over() {
        let mut failed = item("m1", "q", "", 0);
        failed.status = "error".to_string();
        failed.error = Some("quota exceeded".to_string());
        failed.feedback = Some(Feedback { rating: Rating::Dislike });
        failed.message_files = vec![
            MessageFile {
                id: "f-user".into(),
                belongs_to: "user".into(),
                ..Default::default()
            },
            MessageFile {
                id: "f-ai".into(),
                belongs_to: "assistant".into(),
                ..Default::default()
            },
        ];

        let hydrated = hydrate(&[failed]);
        let (user, ai) = (&hydrated.messages[0], &hydrated.messages[1]);
        assert_eq!(user.files.len(), 1);
        assert_eq!(user.files[0].label(), "f-user");
        assert_eq!(ai.status, MessageStatus::Error);
        assert_eq!(ai.error, "quota exceeded");
        assert_eq!(ai.feedback, Some(Rating::Dislike));
        assert_eq!(ai.files[0].label(), "f-ai");
    }

    #[test]
    fn test_inputs_taken_from_first_item_only_when_non_empty() {
        let mut first = item("m1", "q", "a", 0);
        assert!(hydrate(std::slice::from_ref(&first)).inputs.is_none());

        first
            .inputs
            .insert("name".into(), serde_json::Value::String("Ada".into()));
        first.inputs.insert("age".into(), serde_json::json!(36));
        let inputs = hydrate(&[first]).inputs.unwrap();
        assert_eq!(inputs["name"], "Ada");
        assert_eq!(inputs["age"], "36");
    }

    #[test]
    fn test_empty_history_yields_nothing() {
        let hydrated = hydrate(&[]);
        assert!(hydrated.messages.is_empty());
        assert!(hydrated.inputs.is_none());
    }
}
