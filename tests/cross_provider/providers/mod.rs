pub mod anthropic;
pub mod google;
pub mod huggingface;
pub mod ollama;
pub mod openai;

use llm_gateway::{GenerationSettings, Message, Provider};
use wiremock::MockServer;

pub const SYSTEM_PROMPT: &str = "Answer in one sentence.";
pub const QUESTION: &str = "What is the capital of France?";
pub const ANSWER: &str = "The capital of France is Paris.";

/// The answer split the way a vendor streams it.
pub const ANSWER_DELTAS: [&str; 3] = ["The capital", " of France", " is Paris."];

pub fn conversation() -> Vec<Message> {
    vec![Message::system(SYSTEM_PROMPT), Message::user(QUESTION)]
}

pub fn settings() -> GenerationSettings {
    GenerationSettings {
        temperature: 0.2,
        max_tokens: 64,
        ..Default::default()
    }
}

/// Provider configuration for cross-provider testing
#[derive(Debug, Clone)]
pub struct ProviderCase {
    pub name: &'static str,
    pub model: &'static str,
    /// Whether the vendor streams natively or the adapter synthesizes chunks.
    pub native_streaming: bool,
    /// Whether token counts come from the vendor or are estimated.
    pub reports_usage: bool,
}

/// Trait for provider-specific test setup
#[async_trait::async_trait]
pub trait ProviderTestSetup {
    fn get_config() -> ProviderCase;

    /// Create the adapter pointed at the mock server.
    fn create_provider(base_url: &str) -> Provider;

    /// Path of the non-streaming generation endpoint.
    fn generation_path() -> String;

    /// Mount a successful non-streaming completion.
    async fn mount_generation_mocks(mock_server: &MockServer);

    /// Mount a successful stream of [`ANSWER_DELTAS`].
    async fn mount_streaming_mocks(mock_server: &MockServer);
}

/// Join SSE `data:` payloads into a response body.
pub fn sse_body(events: &[String]) -> String {
    events.iter().map(|event| format!("{event}\n\n")).collect()
}
