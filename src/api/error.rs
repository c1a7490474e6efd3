use thiserror::Error;

/// Errors that can occur while talking to the Dify API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client misconfigured (missing API key, bad URL, unreadable file).
    #[error("config error: {0}")]
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response; `message` is the response body.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    /// Failed to parse the service's response.
    #[error("parse error: {0}")]
    Parse(String),
    /// The stream receiver was dropped (request cancelled).
    #[error("channel closed")]
    ChannelClosed,
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}
