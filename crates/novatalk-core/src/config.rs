//! Configuration: `user_config.toml` overrides, then environment, then defaults.
//!
//! The provider API key is the one required value. It is always supplied
//! externally (config file or environment) and its absence is an explicit
//! `CoreError::NotConfigured`, which clients render as a dedicated
//! configuration-error screen rather than crashing.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const DEFAULT_STORAGE_PATH: &str = "./data/novatalk_vault";
const DEFAULT_HISTORY_LIMIT: usize = 10;

/// User-specific configuration stored in `user_config.toml`. Lets users
/// provide their own provider key without touching the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Provider API key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Provider base URL (e.g. an OpenAI-compatible endpoint).
    #[serde(default)]
    pub api_url: Option<String>,
    /// Preferred chat model.
    #[serde(default)]
    pub chat_model: Option<String>,
    /// Preferred image model.
    #[serde(default)]
    pub image_model: Option<String>,
    /// Session/user identifier the conversation is keyed by.
    #[serde(default)]
    pub session: Option<String>,
}

impl UserConfig {
    /// Default path for the user configuration file.
    pub fn default_path() -> PathBuf {
        PathBuf::from("user_config.toml")
    }

    /// Load from the default path; missing file yields defaults.
    pub fn load() -> CoreResult<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load from a specific path; missing file yields defaults.
    pub fn load_from_path(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct NovaConfig {
    /// Provider API key (required).
    pub api_key: String,
    /// Base URL without trailing slash.
    pub api_url: String,
    pub chat_model: String,
    pub image_model: String,
    /// Provider role name for assistant messages on the wire
    /// ("assistant", or "model" for Gemini-style providers).
    pub assistant_role: String,
    /// How many trailing messages are sent as chat history.
    pub history_limit: usize,
    /// Requested image size/aspect.
    pub image_size: String,
    /// Sled vault location.
    pub storage_path: PathBuf,
    /// Session/user identifier the conversation is keyed by.
    pub session: String,
}

impl NovaConfig {
    /// Resolve configuration: `user_config.toml` first, then environment
    /// (`NOVATALK_*`), then defaults. Fails only on a missing API key.
    pub fn load() -> CoreResult<Self> {
        let file = UserConfig::load().unwrap_or_default();

        let api_key = file
            .api_key
            .filter(|s| !s.trim().is_empty())
            .or_else(|| env_opt_string("NOVATALK_API_KEY"))
            .or_else(|| env_opt_string("OPENAI_API_KEY"))
            .ok_or_else(|| {
                CoreError::NotConfigured(
                    "set NOVATALK_API_KEY (or api_key in user_config.toml)".to_string(),
                )
            })?;

        Ok(Self {
            api_key: api_key.trim().to_string(),
            api_url: file
                .api_url
                .or_else(|| env_opt_string("NOVATALK_API_URL"))
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            chat_model: file
                .chat_model
                .or_else(|| env_opt_string("NOVATALK_CHAT_MODEL"))
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            image_model: file
                .image_model
                .or_else(|| env_opt_string("NOVATALK_IMAGE_MODEL"))
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            assistant_role: env_opt_string("NOVATALK_ASSISTANT_ROLE")
                .unwrap_or_else(|| "assistant".to_string()),
            history_limit: env_usize("NOVATALK_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
            image_size: env_opt_string("NOVATALK_IMAGE_SIZE")
                .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
            storage_path: env_opt_string("NOVATALK_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH)),
            session: file
                .session
                .or_else(|| env_opt_string("NOVATALK_SESSION"))
                .unwrap_or_else(|| "local".to_string()),
        })
    }

    /// Configuration with an explicit key and defaults for everything else.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            assistant_role: "assistant".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            session: "local".to_string(),
        }
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}
