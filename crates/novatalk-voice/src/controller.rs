//! Call turn-taking: a synchronous state machine plus the async loop that
//! wires it to the speech devices and the reply gateway.
//!
//! The machine sequences listening, transcript submission, reply fetch, and
//! playback into a repeating loop:
//!
//! ```text
//! Initializing --greeting spoken--> AiSpeaking
//! AiSpeaking   --utterance ended--> UserListening
//! UserListening --final transcript--> Processing
//! Processing   --reply spoken------> AiSpeaking
//! Processing   --reply failed------> AiSpeaking (apology, then listening)
//! any state    --hang-up-----------> session ends
//! ```
//!
//! Invariant: the controller never listens and speaks at the same time.
//! Reply-fetch errors never halt the loop; the user always gets another turn.

use crate::error::{VoiceError, VoiceResult};
use crate::recognizer::{RecognizerEvent, SpeechRecognizer};
use crate::synthesizer::{SpeechSynthesizer, SynthesizerEvent};
use novatalk_core::{CoreResult, Message, ReplyGateway, APOLOGY_REPLY};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spoken immediately when a call starts; first entry of the call transcript.
pub const CALL_GREETING: &str = "Hello! Let's talk. What's on your mind?";
/// Spoken when a reply fetch fails mid-call; same wording the chat flow
/// appends on a failed send.
pub const CALL_APOLOGY: &str = APOLOGY_REPLY;
/// How many trailing durable messages seed the call context.
pub const CONTEXT_WINDOW: usize = 4;

/// Turn-taking state. Lives only inside the controller; reset per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Initializing,
    AiSpeaking,
    UserListening,
    Processing,
    Error,
}

/// External stimulus fed to the machine.
#[derive(Debug, Clone)]
pub enum CallInput {
    SynthStarted,
    SynthEnded,
    SynthFailed(String),
    FinalTranscript(String),
    RecognizerEnded,
    RecognizerFailed(String),
    ReplyReady(String),
    ReplyFailed(String),
    HangUp,
}

/// Side effect the loop must execute after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum CallAction {
    Speak(String),
    StartListening,
    StopListening,
    CancelSpeech,
    /// Fetch a reply for the given history (context plus call transcript).
    FetchReply(Vec<Message>),
    /// The session is over; collect the transcript.
    End,
}

/// The synchronous turn-taking core. Holds the read-only trailing context
/// and the call transcript (greeting first); emits actions, never performs
/// I/O itself.
pub struct CallMachine {
    state: CallState,
    context: Vec<Message>,
    transcript: Vec<Message>,
}

impl CallMachine {
    /// New machine seeded with the trailing durable context.
    pub fn new(durable: &[Message]) -> Self {
        let start = durable.len().saturating_sub(CONTEXT_WINDOW);
        Self {
            state: CallState::Initializing,
            context: durable[start..].to_vec(),
            transcript: Vec::new(),
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// The call transcript so far, greeting first.
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<Message> {
        self.transcript
    }

    /// Start the call: record and speak the greeting.
    pub fn begin(&mut self) -> Vec<CallAction> {
        self.transcript.push(Message::assistant(CALL_GREETING));
        self.state = CallState::AiSpeaking;
        vec![CallAction::Speak(CALL_GREETING.to_string())]
    }

    /// The call cannot continue (e.g. listening cannot be started).
    pub fn force_error(&mut self) {
        self.state = CallState::Error;
    }

    fn history(&self) -> Vec<Message> {
        let mut history = self.context.clone();
        history.extend(self.transcript.iter().cloned());
        history
    }

    /// Advance the machine by one input, returning the actions to execute.
    pub fn handle(&mut self, input: CallInput) -> Vec<CallAction> {
        use CallAction::*;

        match (self.state, input) {
            (_, CallInput::HangUp) => {
                info!("hang-up requested; ending call");
                vec![StopListening, CancelSpeech, End]
            }

            (CallState::AiSpeaking, CallInput::SynthEnded) => {
                self.state = CallState::UserListening;
                vec![StartListening]
            }
            (CallState::AiSpeaking, CallInput::SynthFailed(e)) => {
                warn!(error = %e, "utterance failed; treating it as finished");
                self.state = CallState::UserListening;
                vec![StartListening]
            }

            (CallState::UserListening, CallInput::FinalTranscript(text)) => {
                if text.trim().is_empty() {
                    return Vec::new();
                }
                info!("turn committed; fetching reply");
                self.transcript.push(Message::user(text));
                self.state = CallState::Processing;
                vec![StopListening, FetchReply(self.history())]
            }
            (CallState::UserListening, CallInput::RecognizerEnded) => {
                debug!("recognizer stopped on its own; restarting");
                vec![StartListening]
            }
            (CallState::UserListening, CallInput::RecognizerFailed(e)) => {
                warn!(error = %e, "recognizer error; restarting listening");
                vec![StartListening]
            }

            (CallState::Processing, CallInput::ReplyReady(text)) => {
                self.transcript.push(Message::assistant(text.clone()));
                self.state = CallState::AiSpeaking;
                vec![Speak(text)]
            }
            (CallState::Processing, CallInput::ReplyFailed(e)) => {
                warn!(error = %e, "reply fetch failed; speaking apology and giving the user another turn");
                self.state = CallState::AiSpeaking;
                vec![Speak(CALL_APOLOGY.to_string())]
            }

            (_, CallInput::SynthStarted) => Vec::new(),
            (state, input) => {
                debug!(?state, ?input, "ignoring stray call event");
                Vec::new()
            }
        }
    }
}

/// Drives a [`CallMachine`] against real (or scripted) devices and a reply
/// gateway. Owns the devices for the lifetime of the call and silences them
/// on every exit path.
pub struct CallController<R, S>
where
    R: SpeechRecognizer,
    S: SpeechSynthesizer,
{
    machine: CallMachine,
    recognizer: R,
    synthesizer: S,
    gateway: Arc<dyn ReplyGateway>,
    state_tx: watch::Sender<CallState>,
}

impl<R, S> CallController<R, S>
where
    R: SpeechRecognizer,
    S: SpeechSynthesizer,
{
    /// Build a controller, probing device availability once. Returns
    /// `VoiceError::Unsupported` when either device is missing so the caller
    /// can disable the call control instead of crashing mid-call.
    pub fn new(
        durable_history: &[Message],
        recognizer: R,
        synthesizer: S,
        gateway: Arc<dyn ReplyGateway>,
    ) -> VoiceResult<(Self, watch::Receiver<CallState>)> {
        if !recognizer.is_available() {
            return Err(VoiceError::Unsupported(
                "speech recognition is not supported on this platform".to_string(),
            ));
        }
        if !synthesizer.is_available() {
            return Err(VoiceError::Unsupported(
                "speech synthesis is not supported on this platform".to_string(),
            ));
        }

        let (state_tx, state_rx) = watch::channel(CallState::Initializing);
        Ok((
            Self {
                machine: CallMachine::new(durable_history),
                recognizer,
                synthesizer,
                gateway,
                state_tx,
            },
            state_rx,
        ))
    }

    /// Run the call until hang-up. Returns the call transcript (greeting
    /// first) for the caller to merge into the durable conversation.
    ///
    /// Hang-up stops the devices immediately but does not cancel an
    /// in-flight reply fetch; a late reply is simply discarded with the
    /// detached task.
    pub async fn run(mut self, mut hangup: watch::Receiver<bool>) -> VoiceResult<Vec<Message>> {
        let mut recognizer_events = self
            .recognizer
            .take_events()
            .ok_or_else(|| VoiceError::Input("recognizer event stream already taken".to_string()))?;
        let mut synthesizer_events = self
            .synthesizer
            .take_events()
            .ok_or_else(|| VoiceError::Output("synthesizer event stream already taken".to_string()))?;
        let mut pending_reply: Option<JoinHandle<CoreResult<String>>> = None;

        info!("call started");
        let actions = self.machine.begin();
        let mut ended = self.apply(actions, &mut pending_reply);
        self.publish_state();

        while !ended {
            let input = tokio::select! {
                res = hangup.changed() => match res {
                    Ok(()) if *hangup.borrow() => CallInput::HangUp,
                    Ok(()) => continue,
                    // hang-up handle dropped: nobody can end the call anymore
                    Err(_) => CallInput::HangUp,
                },

                event = synthesizer_events.recv() => match event {
                    Some(SynthesizerEvent::Started) => CallInput::SynthStarted,
                    Some(SynthesizerEvent::Ended) => CallInput::SynthEnded,
                    Some(SynthesizerEvent::Error(e)) => CallInput::SynthFailed(e),
                    None => {
                        warn!("synthesizer event stream closed; ending call");
                        CallInput::HangUp
                    }
                },

                event = recognizer_events.recv() => match event {
                    Some(RecognizerEvent::Interim(text)) => {
                        debug!(transcript = %text, "interim transcript");
                        continue;
                    }
                    Some(RecognizerEvent::Final(text)) => CallInput::FinalTranscript(text),
                    Some(RecognizerEvent::Ended) => CallInput::RecognizerEnded,
                    Some(RecognizerEvent::Error(e)) => CallInput::RecognizerFailed(e),
                    None => {
                        warn!("recognizer event stream closed; ending call");
                        CallInput::HangUp
                    }
                },

                reply = async {
                    pending_reply
                        .as_mut()
                        .expect("select arm guarded on pending_reply")
                        .await
                }, if pending_reply.is_some() => {
                    pending_reply = None;
                    match reply {
                        Ok(Ok(text)) => CallInput::ReplyReady(text),
                        Ok(Err(e)) => CallInput::ReplyFailed(e.to_string()),
                        Err(e) => CallInput::ReplyFailed(e.to_string()),
                    }
                }
            };

            let actions = self.machine.handle(input);
            ended = self.apply(actions, &mut pending_reply);
            self.publish_state();
        }

        // release discipline: devices are silenced on every exit path
        let _ = self.recognizer.stop();
        let _ = self.synthesizer.cancel();
        info!("call ended");
        Ok(self.machine.into_transcript())
    }

    fn apply(
        &mut self,
        actions: Vec<CallAction>,
        pending_reply: &mut Option<JoinHandle<CoreResult<String>>>,
    ) -> bool {
        let mut ended = false;
        for action in actions {
            match action {
                CallAction::Speak(text) => {
                    if let Err(e) = self.synthesizer.speak(&text) {
                        warn!(error = %e, "synthesis failed; resuming listening");
                        let follow_up = self.machine.handle(CallInput::SynthFailed(e.to_string()));
                        ended |= self.apply(follow_up, pending_reply);
                    }
                }
                CallAction::StartListening => {
                    // conditioned on "not already listening": a state change and
                    // an external restart may both land here
                    if self.recognizer.is_listening() {
                        continue;
                    }
                    if let Err(e) = self.recognizer.start() {
                        warn!(error = %e, "could not start listening; call degraded to error state");
                        self.machine.force_error();
                        let _ = self.synthesizer.cancel();
                    }
                }
                CallAction::StopListening => {
                    if let Err(e) = self.recognizer.stop() {
                        warn!(error = %e, "recognizer stop failed");
                    }
                }
                CallAction::CancelSpeech => {
                    if let Err(e) = self.synthesizer.cancel() {
                        warn!(error = %e, "synthesizer cancel failed");
                    }
                }
                CallAction::FetchReply(history) => {
                    let gateway = Arc::clone(&self.gateway);
                    *pending_reply =
                        Some(tokio::spawn(async move { gateway.chat_reply(&history).await }));
                }
                CallAction::End => ended = true,
            }
        }
        ended
    }

    fn publish_state(&self) {
        let state = self.machine.state();
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }
}
