use crate::providers::ProviderKind;
use crate::response::GenerationResult;
use crate::streaming::{synthesize_chunks, ChunkCallback};
use crate::types::{Feature, GenerationSettings, Message};
use crate::Error;
use std::time::Duration;

/// Delay between synthesized chunks for adapters without a native stream.
pub const SYNTHETIC_CHUNK_DELAY: Duration = Duration::from_millis(50);

/// The capability set every vendor adapter implements.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync + 'static {
    /// Which vendor this adapter speaks to.
    fn kind(&self) -> ProviderKind;

    /// True iff the credential or endpoint this adapter needs is configured.
    /// Performs no I/O.
    fn is_available(&self) -> bool;

    /// Models this adapter accepts.
    async fn available_models(&self) -> Vec<String>;

    /// Model used when this provider serves as the fallback.
    fn default_model(&self) -> &str;

    fn features(&self) -> &'static [Feature];

    fn supports_streaming(&self) -> bool;

    fn rate_limit_description(&self) -> &'static str;

    /// Linear retry backoff unit: attempt `n` waits `n * unit`.
    fn backoff_unit(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Generate a complete response with one network call.
    async fn generate_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, Error>;

    /// Stream a response through `on_chunk`, returning the accumulated result.
    ///
    /// The default replays a full generation word by word.
    async fn generate_streaming_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<GenerationResult, Error> {
        let result = self.generate_response(model, messages, settings).await?;
        synthesize_chunks(&result.content, SYNTHETIC_CHUNK_DELAY, on_chunk).await;
        Ok(result)
    }

    fn is_retryable_error(&self, error: &Error) -> bool {
        error.is_retryable()
    }

    /// Issue one minimal real request. Used for monitoring only.
    async fn health_check(&self) -> Result<(), Error> {
        let settings = GenerationSettings {
            temperature: 0.0,
            max_tokens: 5,
            ..Default::default()
        };
        self.generate_response(self.default_model(), &[Message::user("Hi")], &settings)
            .await
            .map(|_| ())
    }
}
