//! [`TextGenerator`] backed by Rig's Ollama completion model.
//!
//! Rig's completion request takes a single prompt here, so prior turns are
//! rendered into it as a labelled transcript, newest turns kept first when
//! the history exceeds the character budget.

use reqwest::Client as ReqwestClient;
use rig::client::{CompletionClient, Nothing};
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;

use crate::chat::errors::GenerationError;
use crate::chat::generator::{GenerateFuture, TextGenerator};
use crate::chat::message::{Message, Role};
use crate::llm::config::LlmConfig;

/// System preamble for every completion.
const CHAT_PREAMBLE: &str = "You are a helpful assistant. Answer the latest user message, \
using the earlier conversation as context when it is given.";

/// Character budget for the rendered history.
const MAX_HISTORY_CHARS: usize = 6000;

/// Rig-based generator.
pub struct RigGenerator {
    model: ollama::CompletionModel,
    temperature: f64,
    max_tokens: Option<u64>,
}

impl RigGenerator {
    /// Create a new generator from config.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = ollama::Client::<ReqwestClient>::builder()
            .api_key(Nothing)
            .base_url(config.base())
            .build()?;
        let model = client.completion_model(config.model.clone());

        Ok(Self {
            model,
            temperature: config.temperature,
            max_tokens: Some(u64::from(config.num_predict)),
        })
    }
}

impl TextGenerator for RigGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            let request = self
                .model
                .completion_request(render_prompt(history, prompt, MAX_HISTORY_CHARS))
                .preamble(CHAT_PREAMBLE.to_string())
                .temperature(self.temperature)
                .max_tokens_opt(self.max_tokens)
                .build();

            let response = self.model.completion(request).await?;
            Ok(extract_text(&response.choice))
        })
    }

    fn name(&self) -> &str {
        "rig"
    }
}

/// Extract text from assistant response.
fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

/// Render history plus the new prompt. With no history the prompt is sent as is.
fn render_prompt(history: &[Message], prompt: &str, max_chars: usize) -> String {
    if history.is_empty() {
        return prompt.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut char_count = 0;

    for message in history.iter().rev() {
        let label = match message.role() {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        let line = format!("{label}: {}\n", message.content());
        let line_len = line.chars().count();
        if char_count + line_len > max_chars {
            break;
        }
        char_count += line_len;
        lines.push(line);
    }

    let mut out = String::from("Conversation so far:\n");
    if lines.len() < history.len() {
        out.push_str("...\n");
    }
    for line in lines.iter().rev() {
        out.push_str(line);
    }
    out.push_str("\nUser: ");
    out.push_str(prompt);
    out
}
