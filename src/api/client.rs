//! HTTP client for the Dify chat-app API.
//!
//! One `DifyApi` talks to one app: the base URL and API key come from runtime
//! configuration and are injected into every request by [`DifyApi::request`].

use std::path::Path;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc::Sender;

use super::error::ApiError;
use super::service::ChatApi;
use super::stream::{ChatEvent, SseDecoder};
use super::types::{
    AppInfo, AppMeta, AppParameters, ConversationHistoryResponse, ConversationItem,
    ConversationListResponse, FeedbackRequest, RenameConversationRequest, SendMessageRequest,
    SuggestionsResponse, UploadedFile,
};

/// Conversations returned when the caller doesn't ask for a specific count.
pub const DEFAULT_CONVERSATION_LIMIT: u32 = 100;

/// Connection settings for a single Dify app.
#[derive(Debug, Clone, PartialEq)]
pub struct DifyApiOptions {
    pub api_base: String,
    pub api_key: String,
    pub user: String,
}

pub struct DifyApi {
    options: DifyApiOptions,
    client: reqwest::Client,
}

impl DifyApi {
    pub fn new(options: DifyApiOptions) -> Result<Self, ApiError> {
        if options.api_key.trim().is_empty() {
            return Err(ApiError::Config("API key is empty".to_string()));
        }
        if !options.api_base.starts_with("http://") && !options.api_base.starts_with("https://") {
            return Err(ApiError::Config(format!(
                "API base must be an http(s) URL, got '{}'",
                options.api_base
            )));
        }
        Ok(Self {
            options: DifyApiOptions {
                api_base: options.api_base.trim_end_matches('/').to_string(),
                ..options
            },
            client: reqwest::Client::new(),
        })
    }

    pub fn options(&self) -> &DifyApiOptions {
        &self.options
    }

    /// Shared request base: resolves `path` against the API base and adds the bearer key.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.options.api_base, path))
            .header("Authorization", format!("Bearer {}", self.options.api_key))
    }

    /// Sends the request and turns non-2xx statuses into `ApiError::Api`.
    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await?;
        debug!("Dify response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Dify API error: {} - {}", status, err_body);
            return Err(ApiError::Api {
                status,
                message: err_body,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("Unexpected response body: {}", body);
            ApiError::Parse(e.to_string())
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        debug!("GET {} {:?}", path, query);
        self.send_json(self.request(Method::GET, path).query(query))
            .await
    }
}

/// MIME type sent with an upload. Dify only accepts images as chat
/// attachments and rejects anything else with a readable error.
fn upload_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[async_trait]
impl ChatApi for DifyApi {
    fn user(&self) -> &str {
        &self.options.user
    }

    async fn get_app_info(&self) -> Result<AppInfo, ApiError> {
        self.get_json("/info", &[]).await
    }

    async fn get_app_meta(&self) -> Result<AppMeta, ApiError> {
        self.get_json("/meta", &[]).await
    }

    async fn get_app_parameters(&self) -> Result<AppParameters, ApiError> {
        self.get_json("/parameters", &[]).await
    }

    async fn get_conversation_list(
        &self,
        limit: Option<u32>,
    ) -> Result<ConversationListResponse, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_CONVERSATION_LIMIT).to_string();
        self.get_json(
            "/conversations",
            &[("user", self.user()), ("limit", limit.as_str())],
        )
        .await
    }

    async fn rename_conversation(
        &self,
        request: RenameConversationRequest,
    ) -> Result<ConversationItem, ApiError> {
        let mut body = serde_json::to_value(&request)
            .map_err(|e| ApiError::Parse(format!("Request serialization failed: {e}")))?;
        body["user"] = json!(self.user());

        let path = format!("/conversations/{}/name", request.conversation_id);
        info!("Renaming conversation {}", request.conversation_id);
        self.send_json(self.request(Method::POST, &path).json(&body))
            .await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
        let path = format!("/conversations/{conversation_id}");
        info!("Deleting conversation {}", conversation_id);
        // Newer servers answer 204 with no body, older ones {"result": "success"}
        self.send(
            self.request(Method::DELETE, &path)
                .json(&json!({ "user": self.user() })),
        )
        .await?;
        Ok(())
    }

    async fn get_conversation_history(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationHistoryResponse, ApiError> {
        self.get_json(
            "/messages",
            &[("user", self.user()), ("conversation_id", conversation_id)],
        )
        .await
    }

    async fn send_message(
        &self,
        request: SendMessageRequest,
        sender: Sender<ChatEvent>,
    ) -> Result<(), ApiError> {
        info!(
            "Dify chat request: conversation={:?}, query_len={}, files={}",
            request.conversation_id,
            request.query.len(),
            request.files.len()
        );

        let mut response = self
            .send(self.request(Method::POST, "/chat-messages").json(&request))
            .await?;

        let mut decoder = SseDecoder::new();
        let mut event_count = 0usize;
        let mut answer_len = 0usize;

        while let Some(chunk) = response.chunk().await? {
            debug!("Raw chunk received: {} bytes", chunk.len());
            for event in decoder.push(&chunk) {
                event_count += 1;
                if let ChatEvent::Message(c) = &event {
                    answer_len += c.answer.len();
                }
                if sender.send(event).await.is_err() {
                    warn!("Chat event send failed: receiver dropped");
                    return Err(ApiError::ChannelClosed);
                }
            }
        }

        for event in decoder.finish() {
            event_count += 1;
            if sender.send(event).await.is_err() {
                return Err(ApiError::ChannelClosed);
            }
        }

        info!(
            "Stream ended: {} events, {} answer bytes",
            event_count, answer_len
        );
        Ok(())
    }

    async fn upload_file(&self, path: &Path) -> Result<UploadedFile, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Config(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        info!("Uploading {} ({} bytes)", file_name, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&upload_mime(path))
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("user", self.user().to_string());

        self.send_json(self.request(Method::POST, "/files/upload").multipart(form))
            .await
    }

    async fn get_next_suggestions(&self, message_id: &str) -> Result<Vec<String>, ApiError> {
        let path = format!("/messages/{message_id}/suggested");
        let response: SuggestionsResponse = self.get_json(&path, &[("user", self.user())]).await?;
        Ok(response.data)
    }

    async fn feedback_message(&self, request: FeedbackRequest) -> Result<(), ApiError> {
        let mut body = serde_json::to_value(&request)
            .map_err(|e| ApiError::Parse(format!("Request serialization failed: {e}")))?;
        body["user"] = json!(self.user());

        let path = format!("/messages/{}/feedbacks", request.message_id);
        info!(
            "Feedback {:?} for message {}",
            request.rating, request.message_id
        );
        self.send(self.request(Method::POST, &path).json(&body))
            .await?;
        Ok(())
    }

    async fn stop_task(&self, task_id: &str) -> Result<(), ApiError> {
        let path = format!("/chat-messages/{task_id}/stop");
        info!("Stopping task {}", task_id);
        self.send(
            self.request(Method::POST, &path)
                .json(&json!({ "user": self.user() })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(base: &str, key: &str) -> DifyApiOptions {
        DifyApiOptions {
            api_base: base.to_string(),
            api_key: key.to_string(),
            user: "tester".to_string(),
        }
    }

    #[test]
    fn test_new_rejects_empty_key() {
        let result = DifyApi::new(options("https://api.dify.ai/v1", "  "));
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_new_rejects_non_http_base() {
        let result = DifyApi::new(options("api.dify.ai/v1", "app-key"));
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let api = DifyApi::new(options("https://api.dify.ai/v1/", "app-key")).unwrap();
        assert_eq!(api.options().api_base, "https://api.dify.ai/v1");
        assert_eq!(api.user(), "tester");
    }

    #[test]
    fn test_upload_mime() {
        assert_eq!(upload_mime(Path::new("a/b.PNG")), "image/png");
        assert_eq!(upload_mime(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(upload_mime(Path::new("notes.txt")), "text/plain");
        assert_eq!(upload_mime(Path::new("noext")), "application/octet-stream");
    }
}
