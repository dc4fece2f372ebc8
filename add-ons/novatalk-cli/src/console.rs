//! Console-backed speech devices: typed lines stand in for recognition and
//! printed lines for synthesis, driving the call loop through the same
//! adapter seams a real device integration would use.

use novatalk_voice::{
    RecognizerEvent, SpeechRecognizer, SpeechSynthesizer, SynthesizerEvent, VoiceError,
    VoiceResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Recognizer fed by the REPL's input lines.
pub struct ConsoleRecognizer {
    listening: Arc<AtomicBool>,
    // keeps the channel open even if the line-input handle is dropped
    _event_tx: mpsc::UnboundedSender<RecognizerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<RecognizerEvent>>,
}

impl ConsoleRecognizer {
    pub fn new() -> (Self, ConsoleLineInput) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let listening = Arc::new(AtomicBool::new(false));
        let input = ConsoleLineInput {
            listening: Arc::clone(&listening),
            event_tx: event_tx.clone(),
        };
        (
            Self {
                listening,
                _event_tx: event_tx,
                event_rx: Some(event_rx),
            },
            input,
        )
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self) -> VoiceResult<()> {
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> VoiceResult<()> {
        self.listening.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RecognizerEvent>> {
        self.event_rx.take()
    }
}

/// REPL-side handle: every typed line becomes a final transcript while the
/// controller is listening; lines typed at other times are dropped.
#[derive(Clone)]
pub struct ConsoleLineInput {
    listening: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<RecognizerEvent>,
}

impl ConsoleLineInput {
    /// Returns false when the line was dropped because nobody was listening.
    pub fn push_line(&self, line: &str) -> bool {
        if !self.listening.load(Ordering::SeqCst) {
            return false;
        }
        self.event_tx
            .send(RecognizerEvent::Final(line.to_string()))
            .is_ok()
    }
}

/// Synthesizer that prints an utterance and completes it immediately.
pub struct ConsoleSynthesizer {
    speaking: bool,
    event_tx: mpsc::UnboundedSender<SynthesizerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SynthesizerEvent>>,
}

impl ConsoleSynthesizer {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            speaking: false,
            event_tx,
            event_rx: Some(event_rx),
        }
    }
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn is_available(&self) -> bool {
        true
    }

    fn speak(&mut self, text: &str) -> VoiceResult<()> {
        println!("novatalk )) {text}");
        self.speaking = true;
        self.event_tx
            .send(SynthesizerEvent::Started)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))?;
        // console "playback" is instantaneous
        self.speaking = false;
        self.event_tx
            .send(SynthesizerEvent::Ended)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }

    fn cancel(&mut self) -> VoiceResult<()> {
        self.speaking = false;
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SynthesizerEvent>> {
        self.event_rx.take()
    }
}
