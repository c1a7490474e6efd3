//! # App Store
//!
//! Multi-app mode keeps a list of Dify apps (name plus connection settings).
//! The list lives either in a local JSON file or behind a small REST backend.
//!
//! ```text
//! AppStore (trait)
//! ├── LocalAppStore   ~/.dify-chat/apps.json, atomic writes (.tmp + rename)
//! └── RestAppStore    GET/POST {base}/apps, GET/PUT/DELETE {base}/apps/{id}
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::DifyApiOptions;
use crate::core::config::ResolvedStore;

/// Display information about an app.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DifyAppInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// How to reach an app.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    pub api_base: String,
    pub api_key: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifyAppItem {
    pub id: String,
    pub info: DifyAppInfo,
    pub request_config: RequestConfig,
}

impl DifyAppItem {
    /// New app entry with a fresh id.
    pub fn new(name: impl Into<String>, api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            info: DifyAppInfo {
                name: name.into(),
                ..Default::default()
            },
            request_config: RequestConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
            },
        }
    }

    /// Connection options for talking to this app as `user`.
    pub fn api_options(&self, user: &str) -> DifyApiOptions {
        DifyApiOptions {
            api_base: self.request_config.api_base.clone(),
            api_key: self.request_config.api_key.clone(),
            user: user.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("app store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("app store data error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("app store network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("app store returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("app '{0}' not found")]
    NotFound(String),
    #[error("app '{0}' already exists")]
    Duplicate(String),
}

#[async_trait]
pub trait AppStore: Send + Sync {
    async fn list_apps(&self) -> Result<Vec<DifyAppItem>, StoreError>;

    async fn get_app(&self, id: &str) -> Result<Option<DifyAppItem>, StoreError>;

    async fn add_app(&self, app: DifyAppItem) -> Result<(), StoreError>;

    async fn update_app(&self, app: DifyAppItem) -> Result<(), StoreError>;

    async fn delete_app(&self, id: &str) -> Result<(), StoreError>;
}

/// Build the store the config points at.
pub fn open_store(store: &ResolvedStore) -> Arc<dyn AppStore> {
    match store {
        ResolvedStore::Local(path) => Arc::new(LocalAppStore::new(path.clone())),
        ResolvedStore::Rest(base_url) => Arc::new(RestAppStore::new(base_url)),
    }
}

// ============================================================================
// Local JSON file
// ============================================================================

#[derive(Serialize, Deserialize, Default, Debug)]
struct AppIndex {
    apps: Vec<DifyAppItem>,
}

pub struct LocalAppStore {
    path: PathBuf,
}

impl LocalAppStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<AppIndex, StoreError> {
        if !self.path.exists() {
            return Ok(AppIndex::default());
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn save(&self, index: &AppIndex) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write_json(&self.path, index)?;
        debug!("Saved {} app(s) to {}", index.apps.len(), self.path.display());
        Ok(())
    }
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[async_trait]
impl AppStore for LocalAppStore {
    async fn list_apps(&self) -> Result<Vec<DifyAppItem>, StoreError> {
        Ok(self.load()?.apps)
    }

    async fn get_app(&self, id: &str) -> Result<Option<DifyAppItem>, StoreError> {
        Ok(self.load()?.apps.into_iter().find(|a| a.id == id))
    }

    async fn add_app(&self, app: DifyAppItem) -> Result<(), StoreError> {
        let mut index = self.load()?;
        if index.apps.iter().any(|a| a.id == app.id) {
            return Err(StoreError::Duplicate(app.id));
        }
        info!("Adding app {} ({})", app.info.name, app.id);
        index.apps.push(app);
        self.save(&index)
    }

    async fn update_app(&self, app: DifyAppItem) -> Result<(), StoreError> {
        let mut index = self.load()?;
        let Some(existing) = index.apps.iter_mut().find(|a| a.id == app.id) else {
            return Err(StoreError::NotFound(app.id));
        };
        *existing = app;
        self.save(&index)
    }

    async fn delete_app(&self, id: &str) -> Result<(), StoreError> {
        let mut index = self.load()?;
        let before = index.apps.len();
        index.apps.retain(|a| a.id != id);
        if index.apps.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!("Deleted app {}", id);
        self.save(&index)
    }
}

// ============================================================================
// REST backend
// ============================================================================

pub struct RestAppStore {
    base_url: String,
    client: reqwest::Client,
}

impl RestAppStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/apps{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("App store error: {} - {}", status, message);
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AppStore for RestAppStore {
    async fn list_apps(&self) -> Result<Vec<DifyAppItem>, StoreError> {
        let response = self.client.get(self.url("")).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_app(&self, id: &str) -> Result<Option<DifyAppItem>, StoreError> {
        let response = self.client.get(self.url(&format!("/{id}"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response).await?.json().await?))
    }

    async fn add_app(&self, app: DifyAppItem) -> Result<(), StoreError> {
        let response = self.client.post(self.url("")).json(&app).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_app(&self, app: DifyAppItem) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.url(&format!("/{}", app.id)))
            .json(&app)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(app.id));
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_app(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.url(&format!("/{id}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalAppStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAppStore::new(dir.path().join("nested").join("apps.json"));
        (dir, store)
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let mut item = DifyAppItem::new("Helper", "https://api.dify.ai/v1", "app-1");
        item.id = "a1".into();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["requestConfig"]["apiBase"], "https://api.dify.ai/v1");
        assert_eq!(json["requestConfig"]["apiKey"], "app-1");
        assert_eq!(json["info"]["name"], "Helper");
    }

    #[test]
    fn test_api_options_carry_user() {
        let item = DifyAppItem::new("Helper", "http://x/v1", "k");
        let options = item.api_options("ada");
        assert_eq!(options.api_base, "http://x/v1");
        assert_eq!(options.api_key, "k");
        assert_eq!(options.user, "ada");
    }

    #[tokio::test]
    async fn test_local_store_crud() {
        let (_dir, store) = store();
        assert!(store.list_apps().await.unwrap().is_empty());

        let mut app = DifyAppItem::new("One", "http://one/v1", "k1");
        store.add_app(app.clone()).await.unwrap();
        assert!(store.path().exists());
        assert_eq!(store.get_app(&app.id).await.unwrap(), Some(app.clone()));

        app.info.name = "Uno".into();
        store.update_app(app.clone()).await.unwrap();
        assert_eq!(store.list_apps().await.unwrap()[0].info.name, "Uno");

        store.delete_app(&app.id).await.unwrap();
        assert!(store.get_app(&app.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_store_rejects_duplicates_and_unknown_ids() {
        let (_dir, store) = store();
        let app = DifyAppItem::new("One", "http://one/v1", "k1");
        store.add_app(app.clone()).await.unwrap();
        assert!(matches!(
            store.add_app(app.clone()).await,
            Err(StoreError::Duplicate(_))
        ));
        assert!(matches!(
            store.delete_app("missing").await,
            Err(StoreError::NotFound(_))
        ));
        let ghost = DifyAppItem::new("Ghost", "http://g/v1", "k");
        assert!(matches!(
            store.update_app(ghost).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_leaves_no_tmp_file() {
        let (_dir, store) = store();
        store
            .add_app(DifyAppItem::new("One", "http://one/v1", "k1"))
            .await
            .unwrap();
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.list_apps().await, Err(StoreError::Json(_))));
    }
}
