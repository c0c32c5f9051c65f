//! Provider implementations for different LLM services.
//!
//! The provider set is closed: [`ProviderKind`] names every vendor and
//! [`Provider`] holds one adapter per variant, dispatching the shared
//! [`LLMProvider`] capability set without trait objects.

pub mod anthropic;
pub mod google;
pub mod huggingface;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use huggingface::HuggingFaceProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;

use crate::provider::LLMProvider;
use crate::response::GenerationResult;
use crate::streaming::ChunkCallback;
use crate::types::{Feature, GenerationSettings, Message};
use crate::Error;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Request timeout for hosted vendors.
pub const HOSTED_TIMEOUT: Duration = Duration::from_secs(60);
/// Request timeout for self-hosted endpoints.
pub const SELF_HOSTED_TIMEOUT: Duration = Duration::from_secs(120);

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAI,
    Groq,
    Anthropic,
    Google,
    HuggingFace,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::OpenAI,
        ProviderKind::Groq,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::HuggingFace,
        ProviderKind::Ollama,
    ];

    /// Name used in requests, cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OpenAI",
            ProviderKind::Groq => "Groq",
            ProviderKind::Anthropic => "Anthropic Claude",
            ProviderKind::Google => "Google Gemini",
            ProviderKind::HuggingFace => "Hugging Face",
            ProviderKind::Ollama => "Ollama (self-hosted)",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| Error::ProviderUnavailable(s.to_string()))
    }
}

/// One adapter per vendor.
pub enum Provider {
    OpenAI(OpenAIProvider),
    Groq(OpenAIProvider),
    Anthropic(AnthropicProvider),
    Google(GoogleProvider),
    HuggingFace(HuggingFaceProvider),
    Ollama(OllamaProvider),
}

macro_rules! dispatch {
    ($self:ident, $p:ident => $body:expr) => {
        match $self {
            Provider::OpenAI($p) | Provider::Groq($p) => $body,
            Provider::Anthropic($p) => $body,
            Provider::Google($p) => $body,
            Provider::HuggingFace($p) => $body,
            Provider::Ollama($p) => $body,
        }
    };
}

#[async_trait::async_trait]
impl LLMProvider for Provider {
    fn kind(&self) -> ProviderKind {
        dispatch!(self, p => p.kind())
    }

    fn is_available(&self) -> bool {
        dispatch!(self, p => p.is_available())
    }

    async fn available_models(&self) -> Vec<String> {
        dispatch!(self, p => p.available_models().await)
    }

    fn default_model(&self) -> &str {
        dispatch!(self, p => p.default_model())
    }

    fn features(&self) -> &'static [Feature] {
        dispatch!(self, p => p.features())
    }

    fn supports_streaming(&self) -> bool {
        dispatch!(self, p => p.supports_streaming())
    }

    fn rate_limit_description(&self) -> &'static str {
        dispatch!(self, p => p.rate_limit_description())
    }

    fn backoff_unit(&self) -> Duration {
        dispatch!(self, p => p.backoff_unit())
    }

    async fn generate_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, Error> {
        dispatch!(self, p => p.generate_response(model, messages, settings).await)
    }

    async fn generate_streaming_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<GenerationResult, Error> {
        dispatch!(self, p => p.generate_streaming_response(model, messages, settings, on_chunk).await)
    }

    fn is_retryable_error(&self, error: &Error) -> bool {
        dispatch!(self, p => p.is_retryable_error(error))
    }

    async fn health_check(&self) -> Result<(), Error> {
        dispatch!(self, p => p.health_check().await)
    }
}

/// Build the HTTP client shared by one adapter.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, Error> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Pass successful responses through; turn failures into a typed error
/// carrying the HTTP status and, when the body has one, the vendor code.
pub(crate) async fn check_status(provider: ProviderKind, response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = parse_error_body(&body);
    Err(Error::provider_status(
        provider.as_str(),
        status.as_u16(),
        code,
        message.unwrap_or_else(|| format!("API error: {status} {body}")),
    ))
}

/// Extract `(code, message)` from the error shapes vendors use:
/// `{"error": {"code"|"status"|"type", "message"}}` or `{"error": "text"}`.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, None);
    };

    match &value["error"] {
        serde_json::Value::String(message) => (None, Some(message.clone())),
        serde_json::Value::Object(error) => {
            let code = ["code", "status", "type"]
                .iter()
                .find_map(|field| error.get(*field).and_then(|v| v.as_str()))
                .map(str::to_string);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string);
            (code, message)
        }
        _ => (None, None),
    }
}
