//! Conversation data model: roles and immutable messages.
//!
//! A conversation is an append-only sequence of `Message`; insertion order is
//! conversation order. Messages are never mutated or deleted after creation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique id (UUID v4).
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Set when an assistant reply carries a generated image (URL or data URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    /// New user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            image_url: None,
        }
    }

    /// New assistant message with a fresh id.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            image_url: None,
        }
    }

    /// New assistant message carrying a generated image.
    pub fn assistant_with_image(content: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            image_url: Some(image_url.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let m = Message::assistant("hello");
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        // image_url is omitted entirely when absent
        assert!(!json.contains("image_url"));
    }

    #[test]
    fn serde_round_trip_preserves_image_url() {
        let m = Message::assistant_with_image("here", "data:image/jpeg;base64,abcd");
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
