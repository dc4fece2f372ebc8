//! Error types for the NovaTalk voice layer.

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur in call mode
#[derive(Error, Debug)]
pub enum VoiceError {
    /// The platform has no usable speech devices. Detected once at setup;
    /// the surrounding UI degrades to a disabled control.
    #[error("speech devices unavailable: {0}")]
    Unsupported(String),

    #[error("speech input error: {0}")]
    Input(String),

    #[error("speech output error: {0}")]
    Output(String),

    #[error("channel send error: {0}")]
    ChannelSend(String),

    #[error(transparent)]
    Core(#[from] novatalk_core::CoreError),
}
