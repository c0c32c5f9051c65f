use super::types::*;
use crate::provider::LLMProvider;
use crate::providers::{check_status, http_client, ProviderKind, SELF_HOSTED_TIMEOUT};
use crate::response::{FinishReason, GenerationResult, Usage};
use crate::streaming::{decode_stream, ChunkCallback, DeltaDecoder, Framing};
use crate::types::{split_system, Feature, GenerationSettings, Message, Role, StreamEvent};
use crate::Error;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Offered when the server's model list cannot be fetched.
const DEFAULT_MODELS: &[&str] = &["llama3.2", "llama3.1", "mistral", "phi3", "gemma2"];

/// Self-hosted Ollama server provider.
pub struct OllamaProvider {
    client: Client,
    base_url: Option<String>,
    models: OnceCell<Vec<String>>,
}

impl OllamaProvider {
    /// Create a provider for the server at `base_url`. `None` leaves the
    /// provider unavailable.
    pub fn new(base_url: Option<String>) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(SELF_HOSTED_TIMEOUT)?,
            base_url: base_url
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            models: OnceCell::new(),
        })
    }

    fn base_url(&self) -> Result<&str, Error> {
        self.base_url
            .as_deref()
            .ok_or_else(|| Error::config("Ollama base URL is not configured"))
    }

    fn convert_request(
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
        stream: bool,
    ) -> OllamaChatRequest {
        let split = split_system(messages);
        let mut wire_messages = Vec::with_capacity(split.turns.len() + 1);

        if let Some(system) = split.system {
            wire_messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        wire_messages.extend(split.turns.iter().map(|msg| OllamaMessage {
            role: match msg.role {
                Role::Assistant => "assistant",
                _ => "user",
            }
            .to_string(),
            content: msg.content.clone(),
        }));

        OllamaChatRequest {
            model: model.to_string(),
            messages: wire_messages,
            stream,
            options: OllamaOptions {
                temperature: settings.temperature,
                top_p: settings.top_p,
                top_k: settings.top_k,
                num_predict: settings.max_tokens,
                stop: settings.stop_sequences(),
            },
        }
    }

    async fn send(&self, body: &OllamaChatRequest) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url()?))
            .json(body)
            .send()
            .await?;

        check_status(ProviderKind::Ollama, response).await
    }

    async fn list_tags(&self) -> Result<Vec<String>, Error> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url()?))
            .send()
            .await?;
        let tags: OllamaTags = check_status(ProviderKind::Ollama, response)
            .await?
            .json()
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn discover_models(&self) -> Vec<String> {
        let fallback = || DEFAULT_MODELS.iter().map(|m| m.to_string()).collect::<Vec<_>>();
        if self.base_url.is_none() {
            return fallback();
        }

        match self.list_tags().await {
            Ok(models) if !models.is_empty() => {
                debug!(count = models.len(), "discovered ollama models");
                models
            }
            Ok(_) => fallback(),
            Err(e) => {
                warn!(error = %e, "ollama model discovery failed, using defaults");
                fallback()
            }
        }
    }
}

/// One JSON object per line; the last one has `done: true` and the counts.
struct ChatLinesDecoder;

impl DeltaDecoder for ChatLinesDecoder {
    fn framing(&self) -> Framing {
        Framing::JsonLines
    }

    fn decode(&mut self, payload: &str) -> Result<Vec<StreamEvent>, Error> {
        let line: OllamaChatResponse = serde_json::from_str(payload)?;
        if let Some(message) = &line.error {
            return Err(Error::provider(ProviderKind::Ollama.as_str(), message.as_str()));
        }

        let mut events = Vec::new();
        if let Some(message) = &line.message {
            events.push(StreamEvent::ContentDelta {
                delta: message.content.clone(),
            });
        }
        if line.done {
            if let Some(usage) = line.usage() {
                events.push(StreamEvent::Usage { usage });
            }
            events.push(StreamEvent::Finish {
                finish_reason: line
                    .done_reason
                    .as_deref()
                    .map(FinishReason::from_vendor)
                    .unwrap_or_default(),
            });
            events.push(StreamEvent::Done);
        }
        Ok(events)
    }
}

#[async_trait::async_trait]
impl LLMProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn is_available(&self) -> bool {
        self.base_url.is_some()
    }

    async fn available_models(&self) -> Vec<String> {
        self.models
            .get_or_init(|| self.discover_models())
            .await
            .clone()
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODELS[0]
    }

    fn features(&self) -> &'static [Feature] {
        &[
            Feature::Chat,
            Feature::Streaming,
            Feature::SystemPrompt,
            Feature::OpenSource,
            Feature::SelfHosted,
        ]
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn rate_limit_description(&self) -> &'static str {
        "Limited by local hardware"
    }

    fn backoff_unit(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn generate_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, Error> {
        let started = Instant::now();
        let body = Self::convert_request(model, messages, settings, false);
        let response: OllamaChatResponse = self.send(&body).await?.json().await?;

        if let Some(message) = &response.error {
            return Err(Error::provider(ProviderKind::Ollama.as_str(), message.as_str()));
        }

        let content = response
            .message
            .as_ref()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let usage = response
            .usage()
            .unwrap_or_else(|| Usage::estimate(messages, &content));

        Ok(GenerationResult {
            content,
            usage,
            finish_reason: response
                .done_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or_default(),
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: ProviderKind::Ollama.as_str().to_string(),
            model: model.to_string(),
            from_cache: false,
        })
    }

    async fn generate_streaming_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<GenerationResult, Error> {
        let started = Instant::now();
        let body = Self::convert_request(model, messages, settings, true);
        let response = self.send(&body).await?;

        let accumulator =
            decode_stream(response.bytes_stream(), &mut ChatLinesDecoder, on_chunk).await?;
        Ok(accumulator.finalize(ProviderKind::Ollama.as_str(), model, messages, started))
    }

    /// Listing local models is enough to prove the server is up.
    async fn health_check(&self) -> Result<(), Error> {
        self.list_tags().await.map(|_| ())
    }
}
