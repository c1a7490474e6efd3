//! Wire types for the Dify chat-app API.
//!
//! Field names follow the JSON the service sends, so most structs derive
//! straight from `serde` without renames. Everything the server may omit is
//! `#[serde(default)]` to keep older Dify deployments parseable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// App info / meta / parameters
// ============================================================================

/// `GET /info`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AppInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `GET /meta`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AppMeta {
    #[serde(default)]
    pub tool_icons: HashMap<String, ToolIcon>,
}

/// A tool icon is either a plain URL or an emoji on a coloured background.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ToolIcon {
    Url(String),
    Emoji { background: String, content: String },
}

/// Single form control in the app's input form.
///
/// Dify sends each control as a one-key object, e.g.
/// `{"text-input": {"label": "Name", "variable": "name", "required": true}}`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum UserInputFormItem {
    TextInput(FormField),
    Paragraph(FormField),
    Number(FormField),
    Select(SelectField),
}

impl UserInputFormItem {
    pub fn label(&self) -> &str {
        &self.field().label
    }

    pub fn variable(&self) -> &str {
        &self.field().variable
    }

    pub fn required(&self) -> bool {
        self.field().required
    }

    pub fn field(&self) -> &FormField {
        match self {
            UserInputFormItem::TextInput(f)
            | UserInputFormItem::Paragraph(f)
            | UserInputFormItem::Number(f) => f,
            UserInputFormItem::Select(s) => &s.field,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct FormField {
    pub label: String,
    pub variable: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct SelectField {
    #[serde(flatten)]
    pub field: FormField,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct FeatureToggle {
    #[serde(default)]
    pub enabled: bool,
}

/// `GET /parameters`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AppParameters {
    #[serde(default)]
    pub opening_statement: String,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
    #[serde(default)]
    pub suggested_questions_after_answer: FeatureToggle,
    #[serde(default)]
    pub user_input_form: Vec<UserInputFormItem>,
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// `GET /conversations`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationListResponse {
    pub data: Vec<ConversationItem>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub limit: u32,
}

/// Body of `POST /conversations/{id}/name`. `name` may be omitted when
/// `auto_generate` is set.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RenameConversationRequest {
    #[serde(skip)]
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub auto_generate: bool,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Like,
    Dislike,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Feedback {
    pub rating: Rating,
}

/// Knowledge-base reference attached to an answer.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RetrieverResource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub dataset_name: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub document_name: String,
    #[serde(default)]
    pub data_source_type: String,
    #[serde(default)]
    pub segment_id: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub hit_count: u32,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub segment_position: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
}

/// One step of an agent-mode answer.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AgentThought {
    pub id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub tool_input: String,
    #[serde(default)]
    pub message_files: Vec<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// A file attached to a message (uploaded by the user or produced by a tool).
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct MessageFile {
    pub id: String,
    #[serde(rename = "type", default)]
    pub file_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub belongs_to: String,
}

/// One entry of `GET /messages`: a user query and the answer to it.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct MessageItem {
    pub id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub message_files: Vec<MessageFile>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub agent_thoughts: Vec<AgentThought>,
    #[serde(default)]
    pub retriever_resources: Vec<RetrieverResource>,
    #[serde(default)]
    pub created_at: i64,
}

/// `GET /messages`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationHistoryResponse {
    pub data: Vec<MessageItem>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub limit: u32,
}

/// `GET /messages/{id}/suggested`
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct SuggestionsResponse {
    #[serde(default)]
    pub data: Vec<String>,
}

// ============================================================================
// Files
// ============================================================================

/// Only images are accepted as chat attachments.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    Image,
}

/// A file sent alongside a chat message, tagged by how it reaches the server.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "transfer_method", rename_all = "snake_case")]
pub enum FileAttachment {
    RemoteUrl {
        #[serde(rename = "type")]
        kind: FileKind,
        url: String,
    },
    LocalFile {
        #[serde(rename = "type")]
        kind: FileKind,
        upload_file_id: String,
    },
}

impl FileAttachment {
    pub fn remote(url: impl Into<String>) -> Self {
        FileAttachment::RemoteUrl {
            kind: FileKind::Image,
            url: url.into(),
        }
    }

    pub fn uploaded(upload_file_id: impl Into<String>) -> Self {
        FileAttachment::LocalFile {
            kind: FileKind::Image,
            upload_file_id: upload_file_id.into(),
        }
    }

    /// Short label used when listing pending attachments.
    pub fn describe(&self) -> String {
        match self {
            FileAttachment::RemoteUrl { url, .. } => url.clone(),
            FileAttachment::LocalFile { upload_file_id, .. } => format!("upload:{upload_file_id}"),
        }
    }
}

/// `POST /files/upload`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: i64,
}

// ============================================================================
// Chat request
// ============================================================================

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    #[default]
    Streaming,
    Blocking,
}

/// Body of `POST /chat-messages`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct SendMessageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub inputs: HashMap<String, String>,
    pub files: Vec<FileAttachment>,
    pub user: String,
    pub response_mode: ResponseMode,
    pub query: String,
}

/// Body of `POST /messages/{id}/feedbacks`. A `None` rating revokes feedback.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FeedbackRequest {
    #[serde(skip)]
    pub message_id: String,
    pub rating: Option<Rating>,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_parse_mixed_form_controls() {
        let json = r#"{
            "opening_statement": "hi",
            "suggested_questions_after_answer": {"enabled": true},
            "user_input_form": [
                {"text-input": {"label": "Name", "variable": "name", "required": true, "default": ""}},
                {"select": {"label": "Tone", "variable": "tone", "required": false, "default": "", "options": ["a", "b"]}},
                {"paragraph": {"label": "Bio", "variable": "bio", "required": false}}
            ]
        }"#;
        let params: AppParameters = serde_json::from_str(json).unwrap();
        assert!(params.suggested_questions_after_answer.enabled);
        assert_eq!(params.user_input_form.len(), 3);
        assert_eq!(params.user_input_form[0].label(), "Name");
        assert!(params.user_input_form[0].required());
        assert_eq!(params.user_input_form[1].variable(), "tone");
        assert!(matches!(&params.user_input_form[1], UserInputFormItem::Select(s) if s.options.len() == 2));
    }

    #[test]
    fn test_file_attachment_tags_transfer_method() {
        let remote = serde_json::to_value(FileAttachment::remote("https://x/y.png")).unwrap();
        assert_eq!(remote["transfer_method"], "remote_url");
        assert_eq!(remote["type"], "image");
        assert_eq!(remote["url"], "https://x/y.png");

        let local = serde_json::to_value(FileAttachment::uploaded("f-1")).unwrap();
        assert_eq!(local["transfer_method"], "local_file");
        assert_eq!(local["upload_file_id"], "f-1");
        assert!(local.get("url").is_none());
    }

    #[test]
    fn test_send_message_request_omits_missing_conversation() {
        let req = SendMessageRequest {
            user: "u".to_string(),
            query: "hello".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("conversation_id"));
        assert!(json.contains(r#""response_mode":"streaming""#));
    }

    #[test]
    fn test_feedback_request_serializes_null_rating() {
        let req = FeedbackRequest {
            message_id: "m".to_string(),
            rating: None,
            content: String::new(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"rating":null,"content":""}"#);
    }

    #[test]
    fn test_meta_tool_icons_accept_both_shapes() {
        let json = r##"{"tool_icons": {"dalle2": "https://icon", "api_tool": {"background": "#fff", "content": "🤖"}}}"##;
        let meta: AppMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.tool_icons["dalle2"], ToolIcon::Url("https://icon".to_string()));
        assert!(matches!(&meta.tool_icons["api_tool"], ToolIcon::Emoji { content, .. } if content == "🤖"));
    }

    #[test]
    fn test_history_item_tolerates_missing_fields() {
        let json = r#"{"id": "m1", "query": "q", "answer": "a", "created_at": 1700000000}"#;
        let item: MessageItem = serde_json::from_str(json).unwrap();
        assert!(item.feedback.is_none());
        assert!(item.agent_thoughts.is_empty());
        assert_eq!(item.created_at, 1700000000);
    }
}
