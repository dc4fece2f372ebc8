//! # NovaTalk Core
//!
//! Conversation engine for the NovaTalk client: data model, intent routing,
//! the completion/image gateway, the conversation vault, and the send-message
//! orchestration.
//!
//! ```text
//! user text ──> Intent Classifier ──> Completion Gateway ──> assistant reply
//!                                          │
//!                                          v
//!                    ChatSession (append-only conversation, busy flag)
//!                                          │
//!                                          v
//!                    ConversationVault (sled + hot cache, best-effort)
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod message;
pub mod orchestrator;
pub mod store;

pub use config::{NovaConfig, UserConfig};
pub use error::{CoreError, CoreResult};
pub use gateway::{
    CompletionGateway, ReplyGateway, EMPTY_HISTORY_REPLY, FALLBACK_REPLY,
};
pub use intent::{classify, Intent, IMAGE_PHRASES};
pub use message::{Message, Role};
pub use orchestrator::{ChatSession, APOLOGY_REPLY, IMAGE_REPLY};
pub use store::{
    ConversationStore, ConversationVault, RECOVERY_GREETING, SEEDED_GREETING,
};
