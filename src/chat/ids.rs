// File: src/chat/ids.rs

//! Identifier types for chat sessions and topics.
//!
//! This module is intentionally **type-heavy** and **logic-light**.
//! Two kinds of identifiers exist:
//! - [`SessionId`]: a UUID naming one presentation-layer session, each of
//!   which owns an independent [`ChatSessionStore`](crate::chat::ChatSessionStore).
//! - [`TopicId`]: a content hash of the normalized user input that opened a
//!   topic. Identical (after normalization) inputs map to the same topic.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::keying;

/// Generate an ID intended to have good insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Identifier for one presentation-layer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl Default for SessionId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SessionId {
    /// Create a new identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(uuid_time_ordered())
    }

    /// Wrap an existing UUID.
    #[inline]
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Borrow the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    #[inline]
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ===== Topic IDs ============================================================

/// Length of a topic id in hex characters (SHA-256).
pub const TOPIC_ID_LEN: usize = 64;

/// Errors returned when parsing a [`TopicId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicIdError {
    /// Wrong number of characters.
    BadLength {
        /// Expected length.
        expected: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a character outside lowercase hex.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
}

impl fmt::Display for TopicIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength { expected, got } => {
                write!(f, "topic id must be {expected} hex chars, got {got}")
            }
            Self::InvalidChar { ch, index } => {
                write!(f, "topic id has invalid char {ch:?} at index {index}")
            }
        }
    }
}

impl std::error::Error for TopicIdError {}

/// Stable topic identifier: lowercase hex SHA-256 of the normalized input
/// that opened the topic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicId(String);

impl TopicId {
    /// Derive the topic id for raw user input.
    #[must_use]
    pub fn for_input(text: &str) -> Self {
        Self(keying::topic_key(text))
    }

    /// Borrow the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TopicId {
    type Err = TopicIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let got = s.chars().count();
        if got != TOPIC_ID_LEN {
            return Err(TopicIdError::BadLength {
                expected: TOPIC_ID_LEN,
                got,
            });
        }
        if let Some((index, ch)) = s
            .chars()
            .enumerate()
            .find(|(_, ch)| !matches!(ch, '0'..='9' | 'a'..='f'))
        {
            return Err(TopicIdError::InvalidChar { ch, index });
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for TopicId {
    type Error = TopicIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TopicId> for String {
    fn from(value: TopicId) -> Self {
        value.0
    }
}

impl AsRef<str> for TopicId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_id_is_stable_for_equivalent_input() {
        let a = TopicId::for_input("What is the capital of France?");
        let b = TopicId::for_input("  what is   the capital of france?\n");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), TOPIC_ID_LEN);
    }

    #[test]
    fn test_topic_id_distinguishes_shared_prefix() {
        let prefix = "Explain the following paragraph in detail please: ";
        let a = TopicId::for_input(&format!("{prefix}alpha"));
        let b = TopicId::for_input(&format!("{prefix}beta"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_topic_id_parse_roundtrip_and_rejects() {
        let id = TopicId::for_input("hello");
        let parsed: TopicId = id.as_str().parse().unwrap_or_else(|_| TopicId::for_input(""));
        assert_eq!(parsed, id);

        assert!(matches!(
            "abc".parse::<TopicId>(),
            Err(TopicIdError::BadLength { got: 3, .. })
        ));
        let bad = "g".repeat(TOPIC_ID_LEN);
        assert_eq!(
            bad.parse::<TopicId>(),
            Err(TopicIdError::InvalidChar { ch: 'g', index: 0 })
        );
    }

    #[test]
    fn test_session_id_display_parses_back() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap_or_default();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_topic_id_serde_as_string() {
        let id = TopicId::for_input("hello");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{id}\""));
        let back: Result<TopicId, _> = serde_json::from_str("\"nope\"");
        assert!(back.is_err());
    }
}
