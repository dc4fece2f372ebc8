//! Intent routing: decide whether a user message asks for chat or an image.
//!
//! Matching is a case-insensitive prefix check against a fixed phrase list.
//! No fuzzy matching, no mid-string detection.

/// Phrases that route a message to image generation when the lower-cased
/// text starts with one of them.
pub const IMAGE_PHRASES: [&str; 4] = [
    "generate an image of",
    "create a picture of",
    "draw a picture of",
    "make an image of",
];

/// The classifier's decision for a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Chat,
    Image,
}

/// Classify raw user text. Pure function, no failure mode.
pub fn classify(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    if IMAGE_PHRASES.iter().any(|p| lowered.starts_with(p)) {
        Intent::Image
    } else {
        Intent::Chat
    }
}
