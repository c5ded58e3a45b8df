//! In-memory chat session store.
//!
//! Owns the topics of one session and mediates every state transition.
//! Each `submit` is atomic: all generation calls complete before any state
//! is touched, so a failed or dropped call leaves the store as it was.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::chat::config::ChatConfig;
use crate::chat::errors::{ChatError, ChatResult, ValidationError};
use crate::chat::generator::{TextGenerator, complete};
use crate::chat::ids::TopicId;
use crate::chat::message::Message;
use crate::chat::title::{TitleCleaner, derive_title};
use crate::chat::topic::{Topic, TopicSummary};

/// Topics of one session, in creation order, plus the active selection.
pub struct ChatSessionStore {
    config: ChatConfig,
    generator: Arc<dyn TextGenerator>,
    titles: TitleCleaner,
    topics: Vec<Topic>,
    index: HashMap<TopicId, usize>,
    /// `None` means "compose a new topic next".
    active: Option<TopicId>,
}

impl fmt::Debug for ChatSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSessionStore")
            .field("generator", &self.generator.name())
            .field("topics", &self.topics.len())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl ChatSessionStore {
    /// Create an empty store.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub fn new(config: ChatConfig, generator: Arc<dyn TextGenerator>) -> ChatResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            generator,
            titles: TitleCleaner::new()?,
            topics: Vec::new(),
            index: HashMap::new(),
            active: None,
        })
    }

    /// Submit user input and record the exchange.
    ///
    /// Input is routed to the topic keyed by its normalized hash. A new
    /// topic gets a reply and a derived title; an existing one continues with
    /// its full history. The resulting topic becomes active.
    ///
    /// # Errors
    /// - [`ChatError::Validation`] for empty or over-length input.
    /// - [`ChatError::Generation`] if the reply call fails or times out.
    ///
    /// In both cases the store is left unchanged.
    pub async fn submit(&mut self, text: &str) -> ChatResult<TopicId> {
        self.validate_input(text)?;

        let id = TopicId::for_input(text);
        let timeout = self.config.generation_timeout();
        let streaming = self.config.streaming;

        if let Some(&pos) = self.index.get(&id) {
            debug!("continuing topic {}", id.short());
            let reply = complete(
                self.generator.as_ref(),
                text,
                self.topics[pos].messages(),
                streaming,
                timeout,
            )
            .await?;

            self.topics[pos].push_exchange(Message::user(text), Message::assistant(reply));
        } else {
            let reply = complete(self.generator.as_ref(), text, &[], streaming, timeout).await?;
            let title = derive_title(self.generator.as_ref(), &self.config, &self.titles, text).await;
            debug!("opened topic {} titled {title:?}", id.short());

            let topic = Topic::open(
                id.clone(),
                title,
                Message::user(text),
                Message::assistant(reply),
            );
            self.index.insert(id.clone(), self.topics.len());
            self.topics.push(topic);
        }

        self.active = Some(id.clone());
        Ok(id)
    }

    /// Make an existing topic the active one.
    ///
    /// # Errors
    /// Returns [`ChatError::NotFound`] if no such topic exists; the active
    /// selection is then unchanged.
    pub fn select_topic(&mut self, id: &TopicId) -> ChatResult<()> {
        if !self.index.contains_key(id) {
            return Err(ChatError::NotFound(id.clone()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    /// Drop every topic and reset the selection. Idempotent.
    pub fn clear_all(&mut self) {
        self.topics.clear();
        self.index.clear();
        self.active = None;
    }

    /// Topics in creation order (oldest first).
    ///
    /// The iterator is lazy and can be restarted by cloning it.
    pub fn list_topics(&self) -> impl Iterator<Item = TopicSummary<'_>> + Clone + '_ {
        self.topics.iter().map(Topic::summary)
    }

    /// The active topic, or `None` when a new topic will be composed next.
    #[must_use]
    pub fn get_active(&self) -> Option<&Topic> {
        self.active.as_ref().and_then(|id| self.topic(id))
    }

    /// Look up a topic by id.
    #[must_use]
    pub fn topic(&self, id: &TopicId) -> Option<&Topic> {
        self.index.get(id).and_then(|&pos| self.topics.get(pos))
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether the store holds no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn validate_input(&self, text: &str) -> Result<(), ValidationError> {
        if text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        let got = text.chars().count();
        if got > self.config.max_input_chars {
            return Err(ValidationError::TooLong {
                max: self.config.max_input_chars,
                got,
            });
        }
        Ok(())
    }
}
