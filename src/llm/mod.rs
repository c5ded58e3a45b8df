//! Text-generation backends.

pub mod config;
pub mod ollama_chat;
pub mod rig_generator;

use std::sync::Arc;

use tracing::info;

pub use config::{Backend, LlmConfig};
pub use ollama_chat::OllamaChatGenerator;
pub use rig_generator::RigGenerator;

use crate::chat::errors::GenerationError;
use crate::chat::generator::TextGenerator;

/// Build the generator selected by `config.backend`.
///
/// # Errors
/// Returns an error if the underlying client cannot be built.
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    info!(
        "Text generator: backend={} model={} url={}",
        config.backend,
        config.model,
        config.base()
    );
    let generator: Arc<dyn TextGenerator> = match config.backend {
        Backend::Ollama => Arc::new(OllamaChatGenerator::new(config)?),
        Backend::Rig => Arc::new(RigGenerator::new(config)?),
    };
    Ok(generator)
}
