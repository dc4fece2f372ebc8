//! Completion gateway: chat replies and image generation over an
//! OpenAI-compatible API.
//!
//! The gateway owns a reqwest client with a request timeout and keeps no
//! other state between calls. A process-wide handle is available through
//! [`CompletionGateway::global`]: built on first use from [`NovaConfig`],
//! reused for the process lifetime, and failing with an explicit
//! `NotConfigured` error when the credential is absent.

use crate::config::NovaConfig;
use crate::error::{CoreError, CoreResult};
use crate::message::{Message, Role};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Returned when the provider answers with an empty payload.
pub const FALLBACK_REPLY: &str = "Sorry, I could not process that.";
/// Returned without a network call when the history is empty.
pub const EMPTY_HISTORY_REPLY: &str = "I'm sorry, there was no message to process.";

static GLOBAL_GATEWAY: OnceCell<CompletionGateway> = OnceCell::new();

/// The seam the orchestrator and the call controller talk through. Lets
/// tests substitute a scripted provider for the real endpoint.
#[async_trait]
pub trait ReplyGateway: Send + Sync {
    /// Forward the conversation history and return the model's reply text.
    async fn chat_reply(&self, history: &[Message]) -> CoreResult<String>;

    /// Forward a prompt to the image endpoint and return a URL or data URI.
    async fn generate_image(&self, prompt: &str) -> CoreResult<String>;
}

// OpenAI-compatible request/response pairs.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
}

#[derive(Debug, PartialEq, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireReply,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImagePayload>,
}

#[derive(Deserialize)]
struct ImagePayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

/// HTTP gateway to the completion and image endpoints.
#[derive(Debug, Clone)]
pub struct CompletionGateway {
    api_key: String,
    api_url: String,
    chat_model: String,
    image_model: String,
    assistant_role: String,
    history_limit: usize,
    image_size: String,
    client: reqwest::Client,
}

impl CompletionGateway {
    /// Build a gateway from resolved configuration.
    pub fn new(config: &NovaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: config.api_key.trim().to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            image_model: config.image_model.clone(),
            assistant_role: config.assistant_role.clone(),
            history_limit: config.history_limit,
            image_size: config.image_size.clone(),
            client,
        }
    }

    /// Process-wide gateway, built on first use from [`NovaConfig::load`].
    /// Returns `CoreError::NotConfigured` when the credential is missing.
    pub fn global() -> CoreResult<&'static CompletionGateway> {
        if let Some(gateway) = GLOBAL_GATEWAY.get() {
            return Ok(gateway);
        }
        let config = NovaConfig::load()?;
        Ok(GLOBAL_GATEWAY.get_or_init(|| CompletionGateway::new(&config)))
    }

    /// Map the trailing history window to the provider's role/content pairs.
    /// The assistant role name is provider-dependent ("assistant" or "model").
    fn wire_history(&self, history: &[Message]) -> Vec<WireMessage> {
        let start = history.len().saturating_sub(self.history_limit);
        history[start..]
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => self.assistant_role.clone(),
                },
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ReplyGateway for CompletionGateway {
    async fn chat_reply(&self, history: &[Message]) -> CoreResult<String> {
        if history.is_empty() {
            return Ok(EMPTY_HISTORY_REPLY.to_string());
        }

        let url = format!("{}/chat/completions", self.api_url);
        let body = ChatRequest {
            model: self.chat_model.clone(),
            messages: self.wire_history(history),
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Gateway(format!("chat request failed: {e}")))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Gateway(format!("chat API error {status}: {body}")));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Gateway(format!("chat response parse failed: {e}")))?;

        let text = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            tracing::warn!("chat endpoint returned an empty payload");
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> CoreResult<String> {
        let url = format!("{}/images/generations", self.api_url);
        let body = ImageRequest {
            model: self.image_model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.image_size.clone(),
            response_format: "b64_json".to_string(),
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Gateway(format!("image request failed: {e}")))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Gateway(format!(
                "image API error {status}: {body}"
            )));
        }

        let parsed: ImageResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Gateway(format!("image response parse failed: {e}")))?;

        match parsed.data.into_iter().next() {
            Some(ImagePayload { url: Some(url), .. }) if !url.is_empty() => Ok(url),
            Some(ImagePayload {
                b64_json: Some(b64),
                ..
            }) if !b64.is_empty() => Ok(data_uri(&b64)),
            _ => Err(CoreError::NoImage),
        }
    }
}

/// Wrap base64 image bytes as an embeddable data URI.
fn data_uri(b64: &str) -> String {
    format!("data:image/jpeg;base64,{b64}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> CompletionGateway {
        let mut config = NovaConfig::with_api_key("sk-test");
        config.history_limit = 3;
        CompletionGateway::new(&config)
    }

    #[test]
    fn wire_history_maps_roles_and_truncates() {
        let gw = gateway();
        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
            Message::assistant("four"),
            Message::user("five"),
        ];
        let wire = gw.wire_history(&history);
        // last 3 only
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0].role, "user");
        assert_eq!(wire[0].content, "three");
        assert_eq!(wire[1].role, "assistant");
        assert_eq!(wire[2].content, "five");
    }

    #[test]
    fn assistant_role_name_is_configurable() {
        let mut config = NovaConfig::with_api_key("sk-test");
        config.assistant_role = "model".to_string();
        let gw = CompletionGateway::new(&config);
        let wire = gw.wire_history(&[Message::assistant("hello")]);
        assert_eq!(wire[0].role, "model");
    }

    #[tokio::test]
    async fn empty_history_short_circuits_without_network() {
        let gw = gateway();
        let reply = gw.chat_reply(&[]).await.unwrap();
        assert_eq!(reply, EMPTY_HISTORY_REPLY);
    }

    #[test]
    fn data_uri_embeds_base64() {
        assert_eq!(data_uri("abcd"), "data:image/jpeg;base64,abcd");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let mut config = NovaConfig::with_api_key("sk-test");
        config.api_url = "https://example.test/v1/".to_string();
        let gw = CompletionGateway::new(&config);
        assert_eq!(gw.api_url, "https://example.test/v1");
    }
}
