//! Async Ollama `/api/chat` client implementing [`TextGenerator`].
//!
//! Behaviour:
//! - History is sent as native chat messages, followed by the new prompt.
//! - Non-streaming calls read `message.content` from a single JSON object.
//! - Streaming calls decode newline-delimited JSON, one increment per line,
//!   until an object with `"done": true` arrives.
//! - An `error` field in any object is reported as a backend error.

use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chat::errors::GenerationError;
use crate::chat::generator::{GenerateFuture, TextGenerator, TextStream};
use crate::chat::message::Message;
use crate::llm::config::LlmConfig;

/// Default thread count if `available_parallelism()` is unavailable.
const DEFAULT_NUM_THREAD: u32 = 8;

#[derive(Clone, Debug, Serialize)]
struct ChatOptions {
    num_ctx: u32,
    num_predict: u32,
    num_thread: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    keep_alive: &'a str,
    options: &'a ChatOptions,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    message: Option<WireReply>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// One decoded NDJSON line.
#[derive(Debug, PartialEq, Eq)]
struct Piece {
    text: String,
    done: bool,
}

/// Ollama chat client.
pub struct OllamaChatGenerator {
    client: Client,
    base_url: String,
    model: String,
    keep_alive: String,
    probe_timeout: Duration,
    options: ChatOptions,
}

impl OllamaChatGenerator {
    /// Create a client from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base().to_string(),
            model: config.model.clone(),
            keep_alive: config.keep_alive.clone(),
            probe_timeout: config.connect_timeout(),
            options: ChatOptions {
                num_ctx: config.num_ctx,
                num_predict: config.num_predict,
                num_thread: detect_num_thread(),
                temperature: config.temperature,
            },
        })
    }

    /// Whether the Ollama server answers `GET /api/version`. The whole
    /// request is bounded by the connect timeout.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent or gets no answer in time.
    pub async fn is_ready(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn post_chat(
        &self,
        prompt: &str,
        history: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: wire_messages(history, prompt),
            stream,
            keep_alive: &self.keep_alive,
            options: &self.options,
        };

        let url = format!("{}/api/chat", self.base_url);
        debug!(
            "POST {url} model={} history={} stream={stream}",
            self.model,
            history.len()
        );
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

impl TextGenerator for OllamaChatGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<String, GenerationError>> {
        Box::pin(async move {
            let response = self.post_chat(prompt, history, false).await?;
            let body = response.bytes().await?;
            let chunk: ChatChunk = serde_json::from_slice(&body)?;
            if let Some(error) = chunk.error {
                return Err(GenerationError::Backend(error));
            }
            chunk
                .message
                .map(|m| m.content)
                .ok_or_else(|| GenerationError::Malformed("missing message".to_string()))
        })
    }

    fn stream<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<TextStream, GenerationError>> {
        Box::pin(async move {
            let response = self.post_chat(prompt, history, true).await?;
            Ok(decode_ndjson(response.bytes_stream()))
        })
    }

    fn ready(&self) -> GenerateFuture<'_, bool> {
        Box::pin(async move { self.is_ready().await.unwrap_or(false) })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

fn wire_messages<'a>(history: &'a [Message], prompt: &'a str) -> Vec<WireMessage<'a>> {
    history
        .iter()
        .map(|m| WireMessage {
            role: m.role().as_str(),
            content: m.content(),
        })
        .chain(std::iter::once(WireMessage {
            role: "user",
            content: prompt,
        }))
        .collect()
}

fn parse_line(line: &[u8]) -> Result<Option<Piece>, GenerationError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let chunk: ChatChunk = serde_json::from_slice(line)?;
    if let Some(error) = chunk.error {
        return Err(GenerationError::Backend(error));
    }
    Ok(Some(Piece {
        text: chunk.message.map(|m| m.content).unwrap_or_default(),
        done: chunk.done,
    }))
}

struct LineState<S> {
    body: Pin<Box<S>>,
    buf: Vec<u8>,
    finished: bool,
}

/// Turn an NDJSON byte stream into text increments.
fn decode_ndjson<S, B>(body: S) -> TextStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    let state = LineState {
        body: Box::pin(body),
        buf: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(pos) = st.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = st.buf.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(piece)) => {
                        st.finished = piece.done;
                        return Some((Ok(piece.text), st));
                    }
                    Err(err) => {
                        st.finished = true;
                        return Some((Err(err), st));
                    }
                }
            }

            match st.body.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(bytes.as_ref()),
                Some(Err(err)) => {
                    st.finished = true;
                    return Some((Err(GenerationError::from(err)), st));
                }
                None => {
                    // Trailing line without a newline.
                    st.finished = true;
                    let line = std::mem::take(&mut st.buf);
                    return match parse_line(&line) {
                        Ok(None) => None,
                        Ok(Some(piece)) => Some((Ok(piece.text), st)),
                        Err(err) => Some((Err(err), st)),
                    };
                }
            }
        }
    })
    .boxed()
}

fn detect_num_thread() -> u32 {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .map_or(DEFAULT_NUM_THREAD, |v| u32::try_from(v).unwrap_or(u32::MAX))
}
