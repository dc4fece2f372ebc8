//! Conversation vault: long-term sled storage with an in-memory hot cache.
//!
//! Values are the full ordered message sequence plus a write timestamp,
//! overwritten wholesale after each exchange. Loading never fails outward:
//! a missing key seeds the greeting conversation and an unreadable value
//! degrades to a recovery greeting. The in-memory conversation held by the
//! session stays authoritative; a failed save is logged and nothing else.

use crate::error::CoreResult;
use crate::message::Message;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use tracing::warn;

const DEFAULT_VAULT_PATH: &str = "./data/novatalk_vault";

/// Greeting seeded for a session with no stored conversation.
pub const SEEDED_GREETING: &str = "Hello! I'm NovaTalk. You can chat with me or request an \
     image. Try 'generate an image of a futuristic city'.";

/// Greeting used when a stored conversation cannot be read back.
pub const RECOVERY_GREETING: &str =
    "I'm sorry, I couldn't load our previous conversation. Let's start fresh!";

/// Persistence seam for conversations, keyed by session identifier.
pub trait ConversationStore: Send + Sync {
    /// Load a session's conversation. Infallible: missing state seeds a
    /// greeting, unreadable state degrades to a recovery greeting.
    fn load(&self, session: &str) -> Vec<Message>;

    /// Overwrite a session's conversation. Best-effort: callers log a
    /// failure and keep the in-memory copy authoritative.
    fn save(&self, session: &str, messages: &[Message]) -> CoreResult<()>;
}

/// Persisted value: the sequence plus the write timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredConversation {
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
}

/// Sled-backed store with a hot cache checked before disk.
pub struct ConversationVault {
    db: Db,
    cache: DashMap<String, Vec<Message>>,
}

impl ConversationVault {
    /// Opens or creates the vault at the default path.
    pub fn new() -> CoreResult<Self> {
        Self::open_path(DEFAULT_VAULT_PATH)
    }

    /// Opens or creates the vault at the given path.
    pub fn open_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            cache: DashMap::new(),
        })
    }

    fn seeded() -> Vec<Message> {
        vec![Message::assistant(SEEDED_GREETING)]
    }

    fn degraded() -> Vec<Message> {
        vec![Message::assistant(RECOVERY_GREETING)]
    }
}

impl ConversationStore for ConversationVault {
    fn load(&self, session: &str) -> Vec<Message> {
        if let Some(messages) = self.cache.get(session) {
            return messages.clone();
        }

        let raw = match self.db.get(session.as_bytes()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                let seeded = Self::seeded();
                self.cache.insert(session.to_string(), seeded.clone());
                return seeded;
            }
            Err(e) => {
                warn!(session, error = %e, "vault read failed; starting a recovery conversation");
                return Self::degraded();
            }
        };

        match serde_json::from_slice::<StoredConversation>(&raw) {
            Ok(stored) => {
                self.cache
                    .insert(session.to_string(), stored.messages.clone());
                stored.messages
            }
            Err(e) => {
                warn!(session, error = %e, "stored conversation unreadable; starting a recovery conversation");
                Self::degraded()
            }
        }
    }

    fn save(&self, session: &str, messages: &[Message]) -> CoreResult<()> {
        let stored = StoredConversation {
            messages: messages.to_vec(),
            updated_at: Utc::now(),
        };
        let raw = serde_json::to_vec(&stored)?;
        self.db.insert(session.as_bytes(), raw)?;
        self.cache.insert(session.to_string(), stored.messages);
        Ok(())
    }
}
