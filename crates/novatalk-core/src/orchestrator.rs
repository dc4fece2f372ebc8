//! Chat orchestration: the send-message flow around one conversation.
//!
//! `ChatSession` owns the authoritative in-memory message sequence. A send
//! appends the user message, routes it by intent, appends the assistant
//! reply (or the fixed apology when the gateway fails), and persists the
//! full sequence best-effort. Only one send may be in flight; a second send
//! is rejected, never queued.

use crate::error::{CoreError, CoreResult};
use crate::gateway::ReplyGateway;
use crate::intent::{classify, Intent};
use crate::message::Message;
use crate::store::ConversationStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Appended in place of a reply when a gateway call fails.
pub const APOLOGY_REPLY: &str = "I'm sorry, I encountered an error. Please try again.";
/// Content of an assistant message carrying a generated image.
pub const IMAGE_REPLY: &str = "Here is the image you requested.";

/// Clears the busy flag on every exit path of a send.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One user's conversation plus the machinery to advance it.
pub struct ChatSession {
    session_id: String,
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn ReplyGateway>,
    messages: Mutex<Vec<Message>>,
    busy: AtomicBool,
}

impl ChatSession {
    /// Open the session, loading (or seeding) its conversation from the store.
    pub fn open(
        session_id: impl Into<String>,
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn ReplyGateway>,
    ) -> Self {
        let session_id = session_id.into();
        let messages = store.load(&session_id);
        Self {
            session_id,
            store,
            gateway,
            messages: Mutex::new(messages),
            busy: AtomicBool::new(false),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Snapshot of the conversation, in order.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Send one user message and return the resulting assistant message.
    ///
    /// Ordering within the turn is strict: append user, call the gateway,
    /// append the assistant reply, persist. Gateway failures surface to the
    /// user as the fixed apology message; only a concurrent send is an error.
    pub async fn send(&self, content: &str) -> CoreResult<Message> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(CoreError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let history = {
            let mut messages = self.messages.lock().await;
            messages.push(Message::user(content));
            messages.clone()
        };

        let reply = match classify(content) {
            Intent::Image => {
                debug!(session = %self.session_id, "routing send to image generation");
                self.gateway
                    .generate_image(content)
                    .await
                    .map(|url| Message::assistant_with_image(IMAGE_REPLY, url))
            }
            Intent::Chat => self
                .gateway
                .chat_reply(&history)
                .await
                .map(Message::assistant),
        };

        let assistant = match reply {
            Ok(message) => message,
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "gateway call failed; substituting apology");
                Message::assistant(APOLOGY_REPLY)
            }
        };

        let snapshot = {
            let mut messages = self.messages.lock().await;
            messages.push(assistant.clone());
            messages.clone()
        };
        self.persist(&snapshot);

        Ok(assistant)
    }

    /// Merge a finished call's turns into the durable conversation.
    ///
    /// The transcript's first entry is the call's own greeting and is not
    /// persisted; a call where nothing was said changes nothing.
    pub async fn end_call(&self, transcript: &[Message]) {
        if transcript.len() <= 1 {
            debug!(session = %self.session_id, "call ended without turns; nothing to merge");
            return;
        }
        let snapshot = {
            let mut messages = self.messages.lock().await;
            messages.extend_from_slice(&transcript[1..]);
            messages.clone()
        };
        self.persist(&snapshot);
    }

    /// Best-effort write-through; failures are logged and never surfaced.
    fn persist(&self, messages: &[Message]) {
        if let Err(e) = self.store.save(&self.session_id, messages) {
            warn!(session = %self.session_id, error = %e, "conversation save failed; in-memory copy stays authoritative");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    struct StubGateway {
        reply: CoreResult<String>,
        image: CoreResult<String>,
        prompts: StdMutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl StubGateway {
        fn chat(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                image: Err(CoreError::NoImage),
                prompts: StdMutex::new(Vec::new()),
                gate: None,
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(CoreError::Gateway("connection refused".to_string())),
                image: Err(CoreError::Gateway("connection refused".to_string())),
                prompts: StdMutex::new(Vec::new()),
                gate: None,
            }
        }

        fn image(url: &str) -> Self {
            Self {
                reply: Ok("unused".to_string()),
                image: Ok(url.to_string()),
                prompts: StdMutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(reply: &str, gate: Arc<Notify>) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                image: Err(CoreError::NoImage),
                prompts: StdMutex::new(Vec::new()),
                gate: Some(gate),
            }
        }

        fn clone_result(r: &CoreResult<String>) -> CoreResult<String> {
            match r {
                Ok(s) => Ok(s.clone()),
                Err(CoreError::NoImage) => Err(CoreError::NoImage),
                Err(e) => Err(CoreError::Gateway(e.to_string())),
            }
        }
    }

    #[async_trait]
    impl ReplyGateway for StubGateway {
        async fn chat_reply(&self, _history: &[Message]) -> CoreResult<String> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Self::clone_result(&self.reply)
        }

        async fn generate_image(&self, prompt: &str) -> CoreResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Self::clone_result(&self.image)
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saves: StdMutex<Vec<Vec<Message>>>,
    }

    impl ConversationStore for RecordingStore {
        fn load(&self, _session: &str) -> Vec<Message> {
            vec![Message::assistant("hello there")]
        }

        fn save(&self, _session: &str, messages: &[Message]) -> CoreResult<()> {
            self.saves.lock().unwrap().push(messages.to_vec());
            Ok(())
        }
    }

    struct FailingStore;

    impl ConversationStore for FailingStore {
        fn load(&self, _session: &str) -> Vec<Message> {
            Vec::new()
        }

        fn save(&self, _session: &str, _messages: &[Message]) -> CoreResult<()> {
            Err(CoreError::Storage("disk full".to_string()))
        }
    }

    fn session_with(
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn ReplyGateway>,
    ) -> ChatSession {
        ChatSession::open("test", store, gateway)
    }

    #[tokio::test]
    async fn successful_send_appends_user_then_assistant() {
        let store = Arc::new(RecordingStore::default());
        let session = session_with(store, Arc::new(StubGateway::chat("hi back")));

        let before = session.messages().await;
        let reply = session.send("hi").await.unwrap();
        let after = session.messages().await;

        assert_eq!(after.len(), before.len() + 2);
        assert_eq!(after[before.len()].role, Role::User);
        assert_eq!(after[before.len()].content, "hi");
        assert_eq!(after[before.len() + 1], reply);
        assert_eq!(reply.content, "hi back");
        assert_ne!(after[before.len()].id, reply.id);
    }

    #[tokio::test]
    async fn failed_gateway_appends_apology_without_image() {
        let store = Arc::new(RecordingStore::default());
        let session = session_with(store.clone(), Arc::new(StubGateway::failing()));

        let before = session.messages().await;
        let reply = session.send("hi").await.unwrap();
        let after = session.messages().await;

        assert_eq!(after.len(), before.len() + 2);
        assert_eq!(reply.content, APOLOGY_REPLY);
        assert!(reply.image_url.is_none());

        // persistence still sees the grown sequence
        let saves = store.saves.lock().unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].len(), before.len() + 2);
    }

    #[tokio::test]
    async fn image_request_routes_exact_prompt_to_image_endpoint() {
        let gateway = Arc::new(StubGateway::image("https://img.example/bike.jpg"));
        let store = Arc::new(RecordingStore::default());
        let session = session_with(store, gateway.clone());

        let prompt = "generate an image of a red bicycle";
        let reply = session.send(prompt).await.unwrap();

        assert_eq!(gateway.prompts.lock().unwrap().as_slice(), [prompt]);
        assert_eq!(reply.content, IMAGE_REPLY);
        assert_eq!(
            reply.image_url.as_deref(),
            Some("https://img.example/bike.jpg")
        );
    }

    #[tokio::test]
    async fn failed_image_generation_appends_apology() {
        let gateway = Arc::new(StubGateway::failing());
        let session = session_with(Arc::new(RecordingStore::default()), gateway);

        let reply = session.send("draw a picture of a cat").await.unwrap();
        assert_eq!(reply.content, APOLOGY_REPLY);
        assert!(reply.image_url.is_none());
    }

    #[tokio::test]
    async fn concurrent_send_is_rejected_not_queued() {
        let gate = Arc::new(Notify::new());
        let gateway = Arc::new(StubGateway::gated("slow reply", gate.clone()));
        let session = Arc::new(session_with(Arc::new(RecordingStore::default()), gateway));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.send("first").await })
        };
        while !session.is_busy() {
            tokio::task::yield_now().await;
        }

        let second = session.send("second").await;
        assert!(matches!(second, Err(CoreError::Busy)));

        gate.notify_one();
        let reply = first.await.unwrap().unwrap();
        assert_eq!(reply.content, "slow reply");

        // the rejected send left no trace
        let after = session.messages().await;
        assert_eq!(after.len(), 3);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn save_failure_keeps_in_memory_copy() {
        let session = session_with(Arc::new(FailingStore), Arc::new(StubGateway::chat("ok")));
        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply.content, "ok");
        assert_eq!(session.messages().await.len(), 2);
    }

    #[tokio::test]
    async fn end_call_merges_only_post_greeting_turns() {
        let store = Arc::new(RecordingStore::default());
        let session = session_with(store.clone(), Arc::new(StubGateway::chat("unused")));
        let before = session.messages().await;

        let transcript = vec![
            Message::assistant("Hello! Let's talk. What's on your mind?"),
            Message::user("tell me a story"),
            Message::assistant("once upon a time"),
        ];
        session.end_call(&transcript).await;

        let after = session.messages().await;
        assert_eq!(after.len(), before.len() + 2);
        assert_eq!(after[before.len()].content, "tell me a story");
        assert_eq!(store.saves.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn end_call_with_only_greeting_changes_nothing() {
        let store = Arc::new(RecordingStore::default());
        let session = session_with(store.clone(), Arc::new(StubGateway::chat("unused")));
        let before = session.messages().await;

        session.end_call(&[Message::assistant("greeting")]).await;

        assert_eq!(session.messages().await, before);
        assert!(store.saves.lock().unwrap().is_empty());
    }
}
