//! Topic model: one titled conversation thread.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chat::ids::TopicId;
use crate::chat::message::Message;

/// A conversation thread. Title is written once; messages only grow.
#[derive(Clone, Debug, Serialize)]
pub struct Topic {
    id: TopicId,
    title: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
}

impl Topic {
    /// Open a topic from its first exchange.
    pub(crate) fn open(id: TopicId, title: String, user: Message, assistant: Message) -> Self {
        Self {
            id,
            title,
            messages: vec![user, assistant],
            created_at: Utc::now(),
        }
    }

    /// Append one exchange.
    pub(crate) fn push_exchange(&mut self, user: Message, assistant: Message) {
        self.messages.reserve(2);
        self.messages.push(user);
        self.messages.push(assistant);
    }

    /// Topic identifier.
    #[must_use]
    pub const fn id(&self) -> &TopicId {
        &self.id
    }

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Messages in conversation order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Borrowed listing view.
    #[must_use]
    pub fn summary(&self) -> TopicSummary<'_> {
        TopicSummary {
            id: &self.id,
            title: &self.title,
            message_count: self.messages.len(),
        }
    }
}

/// Listing entry for a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TopicSummary<'a> {
    /// Topic identifier.
    pub id: &'a TopicId,
    /// Display title.
    pub title: &'a str,
    /// Number of messages so far.
    pub message_count: usize,
}
