//! Scripted speech devices: deterministic in-process implementations of the
//! adapter traits. Use them to exercise the call loop without real devices;
//! tests and demos drive transcripts and utterance completion by hand.

use crate::error::{VoiceError, VoiceResult};
use crate::recognizer::{RecognizerEvent, SpeechRecognizer};
use crate::synthesizer::{SpeechSynthesizer, SynthesizerEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Recognizer whose "microphone" is a handle the test (or demo) speaks into.
pub struct ScriptedRecognizer {
    available: bool,
    listening: Arc<AtomicBool>,
    // keeps the channel open even if every mic handle is dropped
    _event_tx: mpsc::UnboundedSender<RecognizerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<RecognizerEvent>>,
}

impl ScriptedRecognizer {
    /// Create the recognizer and the driving handle.
    pub fn new() -> (Self, ScriptedMic) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let listening = Arc::new(AtomicBool::new(false));
        let mic = ScriptedMic {
            listening: Arc::clone(&listening),
            event_tx: event_tx.clone(),
        };
        (
            Self {
                available: true,
                listening,
                _event_tx: event_tx,
                event_rx: Some(event_rx),
            },
            mic,
        )
    }

    /// A recognizer reporting no platform support, for degraded-setup tests.
    pub fn unavailable() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            available: false,
            listening: Arc::new(AtomicBool::new(false)),
            _event_tx: event_tx,
            event_rx: Some(event_rx),
        }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self) -> VoiceResult<()> {
        if !self.available {
            return Err(VoiceError::Unsupported("scripted recognizer".to_string()));
        }
        // idempotent: re-entry must not double-start
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

/// Driving handle for [`ScriptedRecognizer`]. Speech pushed while the device
/// is not listening is dropped, like a microphone that is switched off.
#[derive(Clone)]
pub struct ScriptedMic {
    listening: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<RecognizerEvent>,
}

impl ScriptedMic {
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Deliver an interim transcript; ignored while not listening.
    pub fn interim(&self, text: &str) -> bool {
        self.deliver(RecognizerEvent::Interim(text.to_string()))
    }

    /// Deliver a final transcript; ignored while not listening.
    pub fn final_transcript(&self, text: &str) -> bool {
        self.deliver(RecognizerEvent::Final(text.to_string()))
    }

    /// Simulate the device stopping on its own.
    pub fn end_session(&self) {
        self.listening.store(false, Ordering::SeqCst);
        let _ = self.event_tx.send(RecognizerEvent::Ended);
    }

    /// Simulate a device error.
    pub fn fail(&self, code: &str) {
        self.listening.store(false, Ordering::SeqCst);
        let _ = self.event_tx.send(RecognizerEvent::Error(code.to_string()));
    }

    fn deliver(&self, event: RecognizerEvent) -> bool {
        if !self.is_listening() {
            return false;
        }
        self.event_tx.send(event).is_ok()
    }
}

/// Synthesizer that records utterances; playback completion is driven by the
/// paired [`ScriptedVoice`] handle.
pub struct ScriptedSynthesizer {
    available: bool,
    speaking: Arc<AtomicBool>,
    spoken: Arc<Mutex<Vec<String>>>,
    event_tx: mpsc::UnboundedSender<SynthesizerEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SynthesizerEvent>>,
}

impl ScriptedSynthesizer {
    /// Create the synthesizer and the driving handle.
    pub fn new() -> (Self, ScriptedVoice) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let speaking = Arc::new(AtomicBool::new(false));
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let voice = ScriptedVoice {
            speaking: Arc::clone(&speaking),
            spoken: Arc::clone(&spoken),
            event_tx: event_tx.clone(),
        };
        (
            Self {
                available: true,
                speaking,
                spoken,
                event_tx,
                event_rx: Some(event_rx),
            },
            voice,
        )
    }

    /// A synthesizer reporting no platform support.
    pub fn unavailable() -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            available: false,
            speaking: Arc::new(AtomicBool::new(false)),
            spoken: Arc::new(Mutex::new(Vec::new())),
            event_tx,
            event_rx: Some(event_rx),
        }
    }
}

impl SpeechSynthesizer for ScriptedSynthesizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, text: &str) -> VoiceResult<()> {
        if !self.available {
            return Err(VoiceError::Unsupported("scripted synthesizer".to_string()));
        }
        // a new utterance silently replaces one still playing
        self.speaking.store(true, Ordering::SeqCst);
        self.spoken
            .lock()
            .expect("spoken log poisoned")
            .push(text.to_string());
        self.event_tx
            .send(SynthesizerEvent::Started)
            .map_err(|e| VoiceError::ChannelSend(e.to_string()))
    }

    fn cancel(&mut self) -> VoiceResult<()> {
        self.speaking.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SynthesizerEvent>> {
        self.event_rx.take()
    }
}

/// Driving handle for [`ScriptedSynthesizer`].
#[derive(Clone)]
pub struct ScriptedVoice {
    speaking: Arc<AtomicBool>,
    spoken: Arc<Mutex<Vec<String>>>,
    event_tx: mpsc::UnboundedSender<SynthesizerEvent>,
}

impl ScriptedVoice {
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Everything spoken so far, in order.
    pub fn utterances(&self) -> Vec<String> {
        self.spoken.lock().expect("spoken log poisoned").clone()
    }

    /// Finish the current utterance naturally. Returns false when nothing
    /// was playing.
    pub fn finish_utterance(&self) -> bool {
        if !self.speaking.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.event_tx.send(SynthesizerEvent::Ended).is_ok()
    }

    /// Fail the current utterance.
    pub fn fail_utterance(&self, message: &str) {
        self.speaking.store(false, Ordering::SeqCst);
        let _ = self
            .event_tx
            .send(SynthesizerEvent::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mic_drops_speech_while_not_listening() {
        let (mut recognizer, mic) = ScriptedRecognizer::new();
        let mut events = recognizer.take_events().unwrap();

        assert!(!mic.final_transcript("lost"));
        recognizer.start().unwrap();
        assert!(mic.final_transcript("heard"));

        assert_eq!(
            events.try_recv().unwrap(),
            RecognizerEvent::Final("heard".to_string())
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn start_is_idempotent() {
        let (mut recognizer, _mic) = ScriptedRecognizer::new();
        recognizer.start().unwrap();
        recognizer.start().unwrap();
        assert!(recognizer.is_listening());
        recognizer.stop().unwrap();
        assert!(!recognizer.is_listening());
    }

    #[test]
    fn events_can_only_be_taken_once() {
        let (mut recognizer, _mic) = ScriptedRecognizer::new();
        assert!(recognizer.take_events().is_some());
        assert!(recognizer.take_events().is_none());
    }

    #[test]
    fn new_utterance_replaces_playing_one() {
        let (mut synthesizer, voice) = ScriptedSynthesizer::new();
        let mut events = synthesizer.take_events().unwrap();

        synthesizer.speak("first").unwrap();
        synthesizer.speak("second").unwrap();
        assert!(voice.is_speaking());
        assert_eq!(voice.utterances(), ["first", "second"]);

        assert!(voice.finish_utterance());
        assert!(!voice.is_speaking());
        // only the natural finish produced an Ended
        assert_eq!(events.try_recv().unwrap(), SynthesizerEvent::Started);
        assert_eq!(events.try_recv().unwrap(), SynthesizerEvent::Started);
        assert_eq!(events.try_recv().unwrap(), SynthesizerEvent::Ended);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn cancelled_utterance_emits_no_ended() {
        let (mut synthesizer, voice) = ScriptedSynthesizer::new();
        let mut events = synthesizer.take_events().unwrap();

        synthesizer.speak("cut short").unwrap();
        synthesizer.cancel().unwrap();
        assert!(!voice.finish_utterance());

        assert_eq!(events.try_recv().unwrap(), SynthesizerEvent::Started);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn unavailable_devices_report_no_support() {
        let recognizer = ScriptedRecognizer::unavailable();
        let synthesizer = ScriptedSynthesizer::unavailable();
        assert!(!recognizer.is_available());
        assert!(!synthesizer.is_available());
    }
}
