//! Speech input seam: continuous recognition as an explicit event channel.
//!
//! The browser-style callback device (onresult/onend/onerror) is re-expressed
//! as a trait whose implementation emits [`RecognizerEvent`] on a channel the
//! controller takes at session start and drops on every exit path.

use crate::error::VoiceResult;
use tokio::sync::mpsc;

/// Events emitted by a speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// Provisional transcript that may still change.
    Interim(String),
    /// Transcript the device will not revise further.
    Final(String),
    /// The device stopped on its own.
    Ended,
    /// Device error, carrying the provider's error code or message.
    Error(String),
}

/// Continuous speech recognition device.
pub trait SpeechRecognizer: Send {
    /// Whether the platform supports recognition at all. Probed once at
    /// setup; `false` means the voice controls must be disabled, not crash.
    fn is_available(&self) -> bool;

    /// Begin continuous recognition. Must be a no-op while already listening
    /// so a re-entry from both a state change and an external restart cannot
    /// double-start the device.
    fn start(&mut self) -> VoiceResult<()>;

    /// Stop recognition (best-effort device-level stop).
    fn stop(&mut self) -> VoiceResult<()>;

    fn is_listening(&self) -> bool;

    /// Take the event stream. Yields `None` after the first call.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RecognizerEvent>>;
}
