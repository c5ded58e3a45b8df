//! Configuration for the chat session store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::errors::{ChatError, ChatResult};

/// Placeholder substituted with the user's first message in title prompts.
pub const TITLE_INPUT_PLACEHOLDER: &str = "{input}";

/// Default title prompt template.
pub const DEFAULT_TITLE_PROMPT: &str = "Give the following message a short topic title of at most \
10 characters. Output ONLY the title on a single line, no quotes, no formatting.\n\n{input}";

/// Policy knobs for [`ChatSessionStore`](crate::chat::ChatSessionStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum accepted input length, in characters.
    pub max_input_chars: usize,
    /// Maximum derived title length, in characters.
    pub max_title_chars: usize,
    /// Title used when derivation fails or yields nothing.
    pub fallback_title: String,
    /// Title prompt; must contain `{input}`.
    pub title_prompt: String,
    /// Upper bound for each generation call, in seconds.
    pub generation_timeout_secs: u64,
    /// Fold streamed increments instead of awaiting a single reply.
    pub streaming: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 1000,
            max_title_chars: 10,
            fallback_title: "New chat".to_string(),
            title_prompt: DEFAULT_TITLE_PROMPT.to_string(),
            generation_timeout_secs: 120,
            streaming: false,
        }
    }
}

impl ChatConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        if self.max_input_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "max_input_chars must be > 0".to_string(),
            ));
        }

        if self.max_title_chars == 0 {
            return Err(ChatError::InvalidConfig(
                "max_title_chars must be > 0".to_string(),
            ));
        }

        if self.fallback_title.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "fallback_title must not be blank".to_string(),
            ));
        }

        if self.fallback_title.chars().count() > self.max_title_chars {
            return Err(ChatError::InvalidConfig(format!(
                "fallback_title must fit in max_title_chars ({})",
                self.max_title_chars
            )));
        }

        if !self.title_prompt.contains(TITLE_INPUT_PLACEHOLDER) {
            return Err(ChatError::InvalidConfig(format!(
                "title_prompt must contain {TITLE_INPUT_PLACEHOLDER}"
            )));
        }

        if self.generation_timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "generation_timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Generation timeout as a [`Duration`].
    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
