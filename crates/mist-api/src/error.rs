//! Error types for mist-api

use thiserror::Error;

/// Result type alias using mist-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server URL could not be parsed or joined
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend rejected the bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend returned a non-success status
    #[error("API error ({status}): {}", detail.as_deref().unwrap_or("no detail"))]
    Api {
        status: u16,
        detail: Option<String>,
    },

    /// WebSocket handshake or framing failed
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// An operation needed an open connection
    #[error("Connection is not open")]
    NotConnected,
}

impl Error {
    /// Create an API error from a status code and optional detail
    pub fn api(status: u16, detail: Option<String>) -> Self {
        Self::Api { status, detail }
    }

    /// The backend's `detail` text, when the error carries one
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e.to_string())
    }
}
