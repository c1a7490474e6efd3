//! # Dify API
//!
//! Typed access to a Dify chat app: the wire types, the SSE event decoder for
//! streaming answers, and the HTTP client behind the [`ChatApi`] trait.

pub mod client;
pub mod error;
pub mod service;
pub mod stream;
pub mod types;

pub use client::{DEFAULT_CONVERSATION_LIMIT, DifyApi, DifyApiOptions};
pub use error::ApiError;
pub use service::ChatApi;
pub use stream::{AnswerChunk, ChatEvent, MessageEnd, SseDecoder, StreamError};
pub use types::{
    AgentThought, AppInfo, AppMeta, AppParameters, ConversationHistoryResponse, ConversationItem,
    ConversationListResponse, Feedback, FeedbackRequest, FileAttachment, MessageFile, MessageItem,
    Rating, RenameConversationRequest, RetrieverResource, SendMessageRequest, UploadedFile,
    UserInputFormItem,
};
