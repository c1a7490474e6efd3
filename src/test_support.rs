//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::api::{
    ApiError, AppInfo, AppMeta, AppParameters, ChatApi, ChatEvent, ConversationHistoryResponse,
    ConversationItem, ConversationListResponse, FeedbackRequest, RenameConversationRequest,
    SendMessageRequest, UploadedFile,
};

/// A no-op Dify app for tests that don't need real API calls.
pub struct NoopApi;

#[async_trait]
impl ChatApi for NoopApi {
    fn user(&self) -> &str {
        "test-user"
    }

    async fn get_app_info(&self) -> Result<AppInfo, ApiError> {
        Ok(AppInfo::default())
    }

    async fn get_app_meta(&self) -> Result<AppMeta, ApiError> {
        Ok(AppMeta::default())
    }

    async fn get_app_parameters(&self) -> Result<AppParameters, ApiError> {
        Ok(AppParameters::default())
    }

    async fn get_conversation_list(
        &self,
        _limit: Option<u32>,
    ) -> Result<ConversationListResponse, ApiError> {
        Ok(ConversationListResponse::default())
    }

    async fn rename_conversation(
        &self,
        request: RenameConversationRequest,
    ) -> Result<ConversationItem, ApiError> {
        Ok(ConversationItem {
            id: request.conversation_id,
            name: request.name.unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn delete_conversation(&self, _conversation_id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn get_conversation_history(
        &self,
        _conversation_id: &str,
    ) -> Result<ConversationHistoryResponse, ApiError> {
        Ok(ConversationHistoryResponse::default())
    }

    async fn send_message(
        &self,
        _request: SendMessageRequest,
        _sender: Sender<ChatEvent>,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn upload_file(&self, _path: &Path) -> Result<UploadedFile, ApiError> {
        Ok(UploadedFile::default())
    }

    async fn get_next_suggestions(&self, _message_id: &str) -> Result<Vec<String>, ApiError> {
        Ok(Vec::new())
    }

    async fn feedback_message(&self, _request: FeedbackRequest) -> Result<(), ApiError> {
        Ok(())
    }

    async fn stop_task(&self, _task_id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Creates a test App backed by a NoopApi.
pub fn test_app() -> crate::core::state::App {
    crate::core::state::App::new(Arc::new(NoopApi))
}
