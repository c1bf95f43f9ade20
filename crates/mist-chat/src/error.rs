//! Error types for mist-chat

use thiserror::Error;

/// Result type alias using mist-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a chat session
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the API layer
    #[error(transparent)]
    Api(#[from] mist_api::Error),

    /// Input rejected before reaching the backend
    #[error("{0}")]
    Validation(String),

    /// Login or registration failed; carries the backend detail or a fallback
    #[error("{0}")]
    Auth(String),

    /// The operation needs a logged-in session
    #[error("Not logged in")]
    NotAuthenticated,

    /// Client storage could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// The streaming connection failed
    #[error("Connection error: {0}")]
    Connection(String),
}

impl Error {
    /// Whether the backend rejected our token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Api(mist_api::Error::Unauthorized) | Error::NotAuthenticated)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
