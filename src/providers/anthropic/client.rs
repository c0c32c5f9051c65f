use super::types::*;
use crate::provider::LLMProvider;
use crate::providers::{check_status, http_client, ProviderKind, HOSTED_TIMEOUT};
use crate::response::{FinishReason, GenerationResult, Usage};
use crate::streaming::{decode_stream, ChunkCallback, DeltaDecoder, Framing};
use crate::types::{split_system, Feature, GenerationSettings, Message, Role, StreamEvent};
use crate::Error;
use reqwest::Client;
use std::time::Instant;
use tracing::debug;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-haiku-20240307",
];

/// Anthropic Claude provider implementation.
pub struct AnthropicProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: Option<String>) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, ANTHROPIC_BASE_URL.to_string())
    }

    /// Create a new Anthropic provider with custom base URL (for testing).
    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(HOSTED_TIMEOUT)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert canonical messages to Anthropic format.
    fn convert_request(
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
        stream: bool,
    ) -> AnthropicRequest {
        let split = split_system(messages);
        let messages = split
            .turns
            .iter()
            .map(|msg| AnthropicMessage {
                role: match msg.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: msg.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: model.to_string(),
            messages,
            max_tokens: settings.max_tokens,
            system: split.system,
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            stop_sequences: settings.stop_sequences(),
            stream,
        }
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<reqwest::Response, Error> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::config("Anthropic API key is not configured"))?;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        check_status(ProviderKind::Anthropic, response).await
    }
}

/// Decoder for Anthropic's typed SSE events.
#[derive(Default)]
struct MessagesDecoder;

impl DeltaDecoder for MessagesDecoder {
    fn framing(&self) -> Framing {
        Framing::Sse
    }

    fn decode(&mut self, payload: &str) -> Result<Vec<StreamEvent>, Error> {
        let event: AnthropicStreamEvent = serde_json::from_str(payload)?;

        let events = match event {
            AnthropicStreamEvent::MessageStart { message } => message
                .usage
                .map(|usage| StreamEvent::Usage {
                    usage: usage.into(),
                })
                .into_iter()
                .collect(),
            AnthropicStreamEvent::ContentBlockDelta {
                delta: AnthropicContentDelta::TextDelta { text },
            } => vec![StreamEvent::ContentDelta { delta: text }],
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(reason) = delta.stop_reason {
                    events.push(StreamEvent::Finish {
                        finish_reason: FinishReason::from_vendor(&reason),
                    });
                }
                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage {
                        usage: usage.into(),
                    });
                }
                events
            }
            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Done],
            AnthropicStreamEvent::Error { error } => {
                // overloaded_error mid-stream is the vendor's 529
                let status = (error.error_type == "overloaded_error").then_some(529);
                return Err(Error::Provider {
                    provider: ProviderKind::Anthropic.as_str().to_string(),
                    status,
                    code: Some(error.error_type),
                    message: error.message,
                });
            }
            _ => Vec::new(),
        };
        Ok(events)
    }
}

#[async_trait::async_trait]
impl LLMProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn available_models(&self) -> Vec<String> {
        MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn default_model(&self) -> &str {
        "claude-3-5-haiku-20241022"
    }

    fn features(&self) -> &'static [Feature] {
        &[
            Feature::Chat,
            Feature::Streaming,
            Feature::SystemPrompt,
            Feature::LongContext,
            Feature::Vision,
        ]
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn rate_limit_description(&self) -> &'static str {
        "Tier dependent, 50+ requests/min"
    }

    async fn generate_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, Error> {
        let started = Instant::now();
        let body = Self::convert_request(model, messages, settings, false);
        let response: AnthropicResponse = self.send(&body).await?.json().await?;

        let content = response.text();
        let usage = response
            .usage
            .map(Usage::from)
            .filter(|usage| usage.total_tokens > 0)
            .unwrap_or_else(|| Usage::estimate(messages, &content));

        debug!(model, tokens = usage.total_tokens, "anthropic message received");

        Ok(GenerationResult {
            content,
            usage,
            finish_reason: response
                .stop_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or_default(),
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: ProviderKind::Anthropic.as_str().to_string(),
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
            decode_stream(response.bytes_stream(), &mut MessagesDecoder, on_chunk).await?;
        Ok(accumulator.finalize(ProviderKind::Anthropic.as_str(), model, messages, started))
    }
}
