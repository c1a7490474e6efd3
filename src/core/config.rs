//! # Configuration
//!
//! Settings for the client, applied in this order (later wins):
//! built-in defaults, the config file, environment variables, CLI flags.
//!
//! Config lives at `~/.dify-chat/config.toml`. If missing on first run, a
//! commented-out template listing every option is written there.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// File layout (every field optional)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DifyChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub user: Option<String>,
    pub mode: Option<ChatMode>,
    pub conversation_limit: Option<u32>,
    pub log_level: Option<String>,
}

/// The single app used in `single` mode.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
}

/// Where `multi` mode keeps its list of apps.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
    pub base_url: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// One app, configured in `[app]` or the environment.
    #[default]
    Single,
    /// Several apps, kept in an app store.
    Multi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Local,
    Rest,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_API_BASE: &str = "https://api.dify.ai/v1";
pub const DEFAULT_USER: &str = "dify-chat-user";
pub const DEFAULT_CONVERSATION_LIMIT: u32 = crate::api::DEFAULT_CONVERSATION_LIMIT;
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

// ============================================================================
// Resolved Config (concrete values)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub mode: ChatMode,
    pub user: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub conversation_limit: u32,
    pub log_level: LevelFilter,
    pub store: ResolvedStore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedStore {
    Local(PathBuf),
    Rest(String),
}

/// Values given on the command line; `None` means "not specified".
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub user: Option<String>,
    pub mode: Option<ChatMode>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.dify-chat`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".dify-chat"))
}

/// Returns the path to `~/.dify-chat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.dify-chat/config.toml`.
///
/// A missing file is replaced by the template and yields the defaults;
/// a malformed one is a `ConfigError::Parse`.
pub fn load_config() -> Result<DifyChatConfig, ConfigError> {
    let Some(path) = config_path() else {
        warn!("Could not determine home directory, using default config");
        return Ok(DifyChatConfig::default());
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<DifyChatConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(DifyChatConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: DifyChatConfig = toml::from_str(&contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", redacted(&config));
    Ok(config)
}

/// Debug view of the config without the API key.
fn redacted(config: &DifyChatConfig) -> String {
    format!(
        "general={:?} app.api_base={:?} app.api_key={} store={:?}",
        config.general,
        config.app.api_base,
        if config.app.api_key.is_some() { "<set>" } else { "<unset>" },
        config.store
    )
}

const DEFAULT_CONFIG: &str = r#"# dify-chat configuration
# All settings are optional. Defaults are used for anything not specified.
# Environment variables and CLI flags take precedence over this file.

# [general]
# user = "dify-chat-user"            # Or DIFY_USER; identifies you to the Dify app
# mode = "single"                    # "single" or "multi" (or DIFY_CHAT_MODE)
# conversation_limit = 100
# log_level = "debug"                # "error", "warn", "info", "debug", "trace"

# [app]                              # Used in single mode
# api_base = "https://api.dify.ai/v1"  # Or DIFY_API_BASE
# api_key = "app-..."                # Or DIFY_API_KEY

# [store]                            # Used in multi mode
# backend = "local"                  # "local" (apps.json) or "rest"
# path = "apps.json"                 # Relative to ~/.dify-chat/
# base_url = "http://localhost:3000" # REST backend (or DIFY_APP_STORE_URL)
"#;

/// Best effort: a failure is logged and startup continues.
fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Collapse every layer into the values the client runs with.
pub fn resolve(config: &DifyChatConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`] with an injectable environment lookup.
pub fn resolve_with_env(
    config: &DifyChatConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    // Mode: CLI → env → config → default
    let mode = cli
        .mode
        .or_else(|| env("DIFY_CHAT_MODE").and_then(|m| ChatMode::from_str(&m, true).ok()))
        .or(config.general.mode)
        .unwrap_or_default();

    let user = cli
        .user
        .clone()
        .or_else(|| env("DIFY_USER"))
        .or_else(|| config.general.user.clone())
        .unwrap_or_else(|| DEFAULT_USER.to_string());

    let api_base = cli
        .api_base
        .clone()
        .or_else(|| env("DIFY_API_BASE"))
        .or_else(|| config.app.api_base.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| env("DIFY_API_KEY"))
        .or_else(|| config.app.api_key.clone());

    let log_level = config
        .general
        .log_level
        .as_deref()
        .and_then(|l| l.parse().ok())
        .unwrap_or(DEFAULT_LOG_LEVEL);

    ResolvedConfig {
        mode,
        user,
        api_base,
        api_key,
        conversation_limit: config
            .general
            .conversation_limit
            .unwrap_or(DEFAULT_CONVERSATION_LIMIT),
        log_level,
        store: resolve_store(config, &env),
    }
}

/// REST when a backend URL is configured and the backend isn't forced to local.
fn resolve_store(config: &DifyChatConfig, env: &impl Fn(&str) -> Option<String>) -> ResolvedStore {
    let base_url = env("DIFY_APP_STORE_URL").or_else(|| config.store.base_url.clone());
    match (config.store.backend, base_url) {
        (Some(StoreBackend::Local), _) | (None, None) => {
            ResolvedStore::Local(local_store_path(config))
        }
        (_, Some(url)) => ResolvedStore::Rest(url),
        (Some(StoreBackend::Rest), None) => {
            warn!("REST app store selected without a base_url, using local store");
            ResolvedStore::Local(local_store_path(config))
        }
    }
}

fn local_store_path(config: &DifyChatConfig) -> PathBuf {
    let file = config.store.path.as_deref().unwrap_or("apps.json");
    match config_dir() {
        Some(dir) => dir.join(file),
        None => PathBuf::from(file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let resolved = resolve_with_env(&DifyChatConfig::default(), &CliOverrides::default(), no_env);
        assert_eq!(resolved.mode, ChatMode::Single);
        assert_eq!(resolved.user, DEFAULT_USER);
        assert_eq!(resolved.api_base, DEFAULT_API_BASE);
        assert_eq!(resolved.api_key, None);
        assert_eq!(resolved.conversation_limit, 100);
        assert_eq!(resolved.log_level, LevelFilter::Debug);
        assert!(matches!(resolved.store, ResolvedStore::Local(ref p) if p.ends_with("apps.json")));
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let config: DifyChatConfig = toml::from_str(
            r#"
[general]
user = "file-user"
mode = "multi"

[app]
api_base = "http://file/v1"
api_key = "app-file"
"#,
        )
        .unwrap();

        let env = env_from(&[("DIFY_API_KEY", "app-env"), ("DIFY_USER", "env-user")]);
        let resolved = resolve_with_env(&config, &CliOverrides::default(), &env);
        assert_eq!(resolved.api_key.as_deref(), Some("app-env"));
        assert_eq!(resolved.user, "env-user");
        assert_eq!(resolved.api_base, "http://file/v1");
        assert_eq!(resolved.mode, ChatMode::Multi);

        let cli = CliOverrides {
            api_key: Some("app-cli".into()),
            mode: Some(ChatMode::Single),
            ..Default::default()
        };
        let resolved = resolve_with_env(&config, &cli, &env);
        assert_eq!(resolved.api_key.as_deref(), Some("app-cli"));
        assert_eq!(resolved.mode, ChatMode::Single);
    }

    #[test]
    fn test_mode_from_env_is_case_insensitive() {
        let env = env_from(&[("DIFY_CHAT_MODE", "MULTI")]);
        let resolved = resolve_with_env(&DifyChatConfig::default(), &CliOverrides::default(), env);
        assert_eq!(resolved.mode, ChatMode::Multi);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config = DifyChatConfig {
            app: AppConfig {
                api_key: Some("app-file".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env_from(&[("DIFY_API_KEY", "  ")]);
        let resolved = resolve_with_env(&config, &CliOverrides::default(), env);
        assert_eq!(resolved.api_key.as_deref(), Some("app-file"));
    }

    #[test]
    fn test_store_resolution() {
        let env = env_from(&[("DIFY_APP_STORE_URL", "http://store")]);
        let resolved = resolve_with_env(&DifyChatConfig::default(), &CliOverrides::default(), &env);
        assert_eq!(resolved.store, ResolvedStore::Rest("http://store".into()));

        let forced_local = DifyChatConfig {
            store: StoreConfig {
                backend: Some(StoreBackend::Local),
                path: Some("mine.json".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve_with_env(&forced_local, &CliOverrides::default(), &env);
        assert!(matches!(resolved.store, ResolvedStore::Local(ref p) if p.ends_with("mine.json")));
    }

    #[test]
    fn test_sparse_toml_parses() {
        let config: DifyChatConfig = toml::from_str("[general]\nlog_level = \"warn\"\n").unwrap();
        assert!(config.general.user.is_none());
        assert!(config.app.api_key.is_none());
        let resolved = resolve_with_env(&config, &CliOverrides::default(), no_env);
        assert_eq!(resolved.log_level, LevelFilter::Warn);
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general\nuser = ").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_generates_commented_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = load_config_from(&path).unwrap();
        assert!(config.general.user.is_none());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# dify-chat configuration"));
        // Everything is commented out, so it parses back to defaults
        let reparsed: DifyChatConfig = toml::from_str(&written).unwrap();
        assert!(reparsed.app.api_base.is_none());
    }
}
