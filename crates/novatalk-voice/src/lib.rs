//! # NovaTalk Voice — call-mode turn-taking
//!
//! Call mode loops speech recognition and synthesis around the same
//! completion call the chat flow uses:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     Call Controller                        │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐  │
//! │  │ Speech Input │──>│ Call Machine │──>│ Reply Gateway│  │
//! │  │ (recognizer) │   │ (turn-taking)│   │  (chat LLM)  │  │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘  │
//! │                            v                              │
//! │                   ┌──────────────┐                        │
//! │                   │ Speech Output│  one utterance at a    │
//! │                   │ (synthesizer)│  time; never while     │
//! │                   └──────────────┘  listening             │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Devices sit behind [`SpeechRecognizer`]/[`SpeechSynthesizer`] trait seams
//! with explicit event channels; scripted implementations drive the loop in
//! tests and demos.

pub mod controller;
pub mod error;
pub mod recognizer;
pub mod scripted;
pub mod synthesizer;

pub use controller::{
    CallAction, CallController, CallInput, CallMachine, CallState, CALL_APOLOGY, CALL_GREETING,
    CONTEXT_WINDOW,
};
pub use error::{VoiceError, VoiceResult};
pub use recognizer::{RecognizerEvent, SpeechRecognizer};
pub use scripted::{ScriptedMic, ScriptedRecognizer, ScriptedSynthesizer, ScriptedVoice};
pub use synthesizer::{SpeechSynthesizer, SynthesizerEvent};
