//! Scripted [`TextGenerator`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures::StreamExt;
use futures::stream;

use crate::chat::errors::GenerationError;
use crate::chat::generator::{GenerateFuture, TextGenerator, TextStream};
use crate::chat::message::Message;

/// Outcome of one scripted call.
pub enum Script {
    /// Reply with the given text.
    Reply(String),
    /// Reply in several increments (only meaningful for `stream`).
    Chunks(Vec<String>),
    /// Fail with a backend error.
    Fail(String),
    /// Never resolve.
    Stall,
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Self::Reply(text.to_string())
    }

    pub fn fail(reason: &str) -> Self {
        Self::Fail(reason.to_string())
    }
}

/// A recorded call.
#[derive(Clone, Debug)]
pub struct Call {
    pub prompt: String,
    pub history: Vec<Message>,
}

/// Replays queued outcomes in order and records every call.
/// An exhausted script fails the call.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, step: Script) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next(&self, prompt: &str, history: &[Message]) -> Option<Script> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                prompt: prompt.to_string(),
                history: history.to_vec(),
            });
        }
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<String, GenerationError>> {
        let step = self.next(prompt, history);
        Box::pin(async move {
            match step {
                Some(Script::Reply(text)) => Ok(text),
                Some(Script::Chunks(parts)) => Ok(parts.concat()),
                Some(Script::Fail(reason)) => Err(GenerationError::Backend(reason)),
                Some(Script::Stall) => std::future::pending().await,
                None => Err(GenerationError::Backend("script exhausted".to_string())),
            }
        })
    }

    fn stream<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<TextStream, GenerationError>> {
        let step = self.next(prompt, history);
        Box::pin(async move {
            let items: Vec<Result<String, GenerationError>> = match step {
                Some(Script::Reply(text)) => vec![Ok(text)],
                Some(Script::Chunks(parts)) => parts.into_iter().map(Ok).collect(),
                Some(Script::Fail(reason)) => {
                    vec![
                        Ok("partial ".to_string()),
                        Err(GenerationError::Backend(reason)),
                    ]
                }
                Some(Script::Stall) => return std::future::pending().await,
                None => return Err(GenerationError::Backend("script exhausted".to_string())),
            };
            Ok(stream::iter(items).boxed())
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
