//! Text-generation backend settings.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::errors::{ChatError, ChatResult};

/// Environment variable for the Ollama base URL (e.g. "http://127.0.0.1:11434").
pub const OLLAMA_URL_ENV: &str = "TOPIC_CHAT_OLLAMA_URL";
/// Environment variable for the model name.
pub const MODEL_ENV: &str = "TOPIC_CHAT_MODEL";
/// Environment variable selecting the backend (`ollama` or `rig`).
pub const BACKEND_ENV: &str = "TOPIC_CHAT_BACKEND";

/// Default Ollama API base URL.
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
/// Default chat model.
const DEFAULT_MODEL: &str = "ministral-3:8b-instruct-2512-q8_0";

/// Which client implementation talks to the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Direct `/api/chat` client with native history and streaming.
    #[default]
    Ollama,
    /// Rig completion model, history folded into the prompt.
    Rig,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::Rig => f.write_str("rig"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "rig" => Ok(Self::Rig),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Completion model settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Client implementation.
    pub backend: Backend,
    /// Model name as installed in Ollama.
    pub model: String,
    /// Ollama API base URL.
    pub base_url: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Context window in tokens.
    pub num_ctx: u32,
    /// Token budget per reply.
    pub num_predict: u32,
    /// How long Ollama keeps the model resident.
    pub keep_alive: String,
    /// TCP connect timeout, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.4,
            num_ctx: 8_192,
            num_predict: 512,
            keep_alive: "1h".to_string(),
            connect_timeout_secs: 5,
        }
    }
}

impl LlmConfig {
    /// Defaults overridden by `TOPIC_CHAT_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> ChatResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(OLLAMA_URL_ENV) {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.model = model;
        }
        if let Ok(backend) = std::env::var(BACKEND_ENV) {
            config.backend = backend.parse().map_err(ChatError::InvalidConfig)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.model.trim().is_empty() {
            return Err(ChatError::InvalidConfig("model must not be empty".to_string()));
        }

        Url::parse(&self.base_url)
            .map_err(|e| ChatError::InvalidConfig(format!("base_url: {e}")))?;

        if self.num_ctx == 0 || self.num_predict == 0 {
            return Err(ChatError::InvalidConfig(
                "num_ctx and num_predict must be > 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ChatError::InvalidConfig(
                "temperature must be within 0.0..=2.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
