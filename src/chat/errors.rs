//! Error types for the chat core.

use std::time::Duration;

use thiserror::Error;

use crate::chat::ids::TopicId;

/// Rejected user input. Never mutates the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Empty or whitespace-only input.
    #[error("input must not be empty")]
    Empty,
    /// Input longer than the configured limit.
    #[error("input too long: {got} characters, max {max}")]
    TooLong {
        /// Configured maximum in characters.
        max: usize,
        /// Actual length in characters.
        got: usize,
    },
}

/// Failure of a text-generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The call did not finish within the configured timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    /// Transport failure talking to the backend.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend answered with a non-success status.
    #[error("backend http status not ok: {0}")]
    Status(u16),
    /// Backend answered with something that could not be decoded.
    #[error("malformed backend response: {0}")]
    Malformed(String),
    /// Backend reported an error in an otherwise well-formed response.
    #[error("backend error: {0}")]
    Backend(String),
    /// Completion error from Rig.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// HTTP client construction error from Rig.
    #[error("http client error: {0}")]
    Client(#[from] rig::http_client::Error),
}

impl GenerationError {
    /// Whether this error is a timeout (locally enforced or transport-level).
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

/// Error surfaced by [`ChatSessionStore`](crate::chat::ChatSessionStore) operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Bad input.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// The reply could not be generated.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// No topic with this id.
    #[error("topic not found: {0}")]
    NotFound(TopicId),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A built-in text pattern failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
