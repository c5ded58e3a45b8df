//! Chat core: topics, their message histories and the active selection.
//!
//! - `ids`: `SessionId` and content-hashed `TopicId`
//! - `keying`: input normalization and hashing
//! - `message` / `topic`: the data model
//! - `generator`: the `TextGenerator` capability the store consumes
//! - `title`: one-shot title derivation with fallback
//! - `store`: `ChatSessionStore`, the state machine

pub mod config;
pub mod errors;
pub mod generator;
pub mod ids;
pub mod keying;
pub mod message;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod title;
pub mod topic;

pub use config::ChatConfig;
pub use errors::{ChatError, ChatResult, GenerationError, ValidationError};
pub use generator::{GenerateFuture, TextGenerator, TextStream, collect_stream};
pub use ids::{SessionId, TopicId};
pub use message::{Message, Role};
pub use store::ChatSessionStore;
pub use topic::{Topic, TopicSummary};
