//! Speech output seam: synthesis as an explicit event channel.
//!
//! At most one utterance is active at a time; speaking while an utterance is
//! still playing cancels the prior one first. A cancelled utterance emits no
//! `Ended` event; only a naturally finished one does.

use crate::error::VoiceResult;
use tokio::sync::mpsc;

/// Events emitted by a speech synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesizerEvent {
    /// Playback of the current utterance began.
    Started,
    /// The current utterance finished naturally.
    Ended,
    /// Device error for the current utterance.
    Error(String),
}

/// Speech synthesis device.
pub trait SpeechSynthesizer: Send {
    /// Whether the platform supports synthesis at all. Probed once at setup.
    fn is_available(&self) -> bool;

    /// Synthesize and play `text`, cancelling any prior utterance first.
    fn speak(&mut self, text: &str) -> VoiceResult<()>;

    /// Stop playback immediately and discard the current utterance.
    fn cancel(&mut self) -> VoiceResult<()>;

    fn is_speaking(&self) -> bool;

    /// Take the event stream. Yields `None` after the first call.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SynthesizerEvent>>;
}
