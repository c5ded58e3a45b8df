//! Text-generation capability consumed by the chat store.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};

use crate::chat::errors::GenerationError;
use crate::chat::message::Message;

/// Boxed future type for generator operations.
pub type GenerateFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Finite stream of text increments. Restart only by issuing the call again.
pub type TextStream = BoxStream<'static, Result<String, GenerationError>>;

/// Trait abstraction over a remote text-generation backend.
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to `prompt`, given the prior conversation `history`.
    ///
    /// # Errors
    /// Returns an error if the backend call fails or its output is unusable.
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<String, GenerationError>>;

    /// Stream a reply as text increments.
    ///
    /// The default yields the whole [`generate`](Self::generate) result as one
    /// increment.
    ///
    /// # Errors
    /// Returns an error if the call cannot be started; later failures arrive
    /// as stream items.
    fn stream<'a>(
        &'a self,
        prompt: &'a str,
        history: &'a [Message],
    ) -> GenerateFuture<'a, Result<TextStream, GenerationError>> {
        Box::pin(async move {
            let text = self.generate(prompt, history).await?;
            Ok(stream::once(async move { Ok::<_, GenerationError>(text) }).boxed())
        })
    }

    /// Whether the backend is reachable. Backends without a probe report `true`.
    fn ready(&self) -> GenerateFuture<'_, bool> {
        Box::pin(async { true })
    }

    /// Short backend label for logs and health output.
    fn name(&self) -> &str;
}

/// Fold a stream of increments into the full text.
///
/// # Errors
/// Returns the first stream error; partial text is discarded.
pub async fn collect_stream(stream: TextStream) -> Result<String, GenerationError> {
    stream
        .try_fold(String::new(), |mut acc, chunk| async move {
            acc.push_str(&chunk);
            Ok(acc)
        })
        .await
}

/// Run `fut` with an upper bound, mapping expiry to [`GenerationError::Timeout`].
///
/// # Errors
/// Returns the inner error, or a timeout error when `limit` elapses first.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, GenerationError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GenerationError::Timeout(limit))?
}

/// Produce a full reply, either directly or by folding the stream.
///
/// # Errors
/// Returns an error if the backend fails or `limit` elapses.
pub async fn complete(
    generator: &dyn TextGenerator,
    prompt: &str,
    history: &[Message],
    streaming: bool,
    limit: Duration,
) -> Result<String, GenerationError> {
    if streaming {
        with_timeout(limit, async {
            let stream = generator.stream(prompt, history).await?;
            collect_stream(stream).await
        })
        .await
    } else {
        with_timeout(limit, generator.generate(prompt, history)).await
    }
}
