use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use super::error::ApiError;
use super::stream::ChatEvent;
use super::types::{
    AppInfo, AppMeta, AppParameters, ConversationHistoryResponse, ConversationItem,
    ConversationListResponse, FeedbackRequest, RenameConversationRequest, SendMessageRequest,
    UploadedFile,
};

/// Everything the chat front end needs from a Dify app.
///
/// [`DifyApi`](super::DifyApi) is the HTTP implementation; tests drive the
/// orchestration with a stub instead.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// The user identifier every user-scoped call is made on behalf of.
    fn user(&self) -> &str;

    async fn get_app_info(&self) -> Result<AppInfo, ApiError>;

    async fn get_app_meta(&self) -> Result<AppMeta, ApiError>;

    async fn get_app_parameters(&self) -> Result<AppParameters, ApiError>;

    /// Lists the user's conversations, most recent first. `None` uses the default limit.
    async fn get_conversation_list(
        &self,
        limit: Option<u32>,
    ) -> Result<ConversationListResponse, ApiError>;

    async fn rename_conversation(
        &self,
        request: RenameConversationRequest,
    ) -> Result<ConversationItem, ApiError>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError>;

    async fn get_conversation_history(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationHistoryResponse, ApiError>;

    /// Starts a streaming chat turn, forwarding every decoded event to `sender`.
    /// Returns once the stream ends or fails.
    async fn send_message(
        &self,
        request: SendMessageRequest,
        sender: Sender<ChatEvent>,
    ) -> Result<(), ApiError>;

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ApiError>;

    async fn get_next_suggestions(&self, message_id: &str) -> Result<Vec<String>, ApiError>;

    async fn feedback_message(&self, request: FeedbackRequest) -> Result<(), ApiError>;

    /// Asks the server to stop generating for a streaming task.
    async fn stop_task(&self, task_id: &str) -> Result<(), ApiError>;
}
