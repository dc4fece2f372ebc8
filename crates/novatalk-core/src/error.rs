//! Error types for the NovaTalk core.

use thiserror::Error;

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the conversation core
#[derive(Error, Debug)]
pub enum CoreError {
    /// The provider credential is missing. Surfaced by the client as a
    /// dedicated configuration screen, never as a crash.
    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("no image was generated")]
    NoImage,

    /// A send is already in flight; the new one is rejected, not queued.
    #[error("a message is already being processed")]
    Busy,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Gateway(err.to_string())
    }
}

impl From<sled::Error> for CoreError {
    fn from(err: sled::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}
