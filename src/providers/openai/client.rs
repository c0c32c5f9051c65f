use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, OpenAIMessage,
    StreamOptions,
};
use crate::provider::LLMProvider;
use crate::providers::{check_status, http_client, ProviderKind, HOSTED_TIMEOUT};
use crate::response::{FinishReason, GenerationResult, Usage};
use crate::streaming::{decode_stream, ChunkCallback, DeltaDecoder, Framing};
use crate::types::{split_system, Feature, GenerationSettings, Message, Role, StreamEvent};
use crate::Error;
use reqwest::Client;
use std::time::Instant;
use tracing::debug;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

const OPENAI_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-3.5-turbo",
];

const GROQ_MODELS: &[&str] = &[
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];

/// Adapter for the Chat Completions API, shared by OpenAI and
/// OpenAI-compatible vendors.
pub struct OpenAIProvider {
    kind: ProviderKind,
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: Option<String>) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, OPENAI_BASE_URL.to_string())
    }

    /// Create a new OpenAI provider with custom base URL.
    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Result<Self, Error> {
        Self::compatible(ProviderKind::OpenAI, api_key, base_url)
    }

    /// Create a Groq provider.
    pub fn groq(api_key: Option<String>) -> Result<Self, Error> {
        Self::groq_with_base_url(api_key, GROQ_BASE_URL.to_string())
    }

    /// Create a Groq provider with custom base URL.
    pub fn groq_with_base_url(api_key: Option<String>, base_url: String) -> Result<Self, Error> {
        Self::compatible(ProviderKind::Groq, api_key, base_url)
    }

    fn compatible(kind: ProviderKind, api_key: Option<String>, base_url: String) -> Result<Self, Error> {
        Ok(Self {
            kind,
            client: http_client(HOSTED_TIMEOUT)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn models(&self) -> &'static [&'static str] {
        match self.kind {
            ProviderKind::Groq => GROQ_MODELS,
            _ => OPENAI_MODELS,
        }
    }

    /// Convert canonical messages and settings to the Chat Completions format.
    /// System text travels as a single leading `system` message.
    fn convert_request(
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
        stream: bool,
    ) -> ChatCompletionRequest {
        let split = split_system(messages);
        let mut wire_messages = Vec::with_capacity(split.turns.len() + 1);

        if let Some(system) = split.system {
            wire_messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        wire_messages.extend(split.turns.iter().map(|msg| OpenAIMessage {
            role: match msg.role {
                Role::Assistant => "assistant",
                _ => "user",
            }
            .to_string(),
            content: msg.content.clone(),
        }));

        ChatCompletionRequest {
            model: model.to_string(),
            messages: wire_messages,
            temperature: settings.temperature,
            top_p: settings.top_p,
            max_tokens: settings.max_tokens,
            stop: settings.stop_sequences(),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    async fn send(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response, Error> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            Error::config(format!("{} API key is not configured", self.kind.display_name()))
        })?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        check_status(self.kind, response).await
    }
}

/// Decoder for `data: {chunk}` events terminated by `data: [DONE]`.
struct ChatCompletionDecoder {
    provider: ProviderKind,
}

impl DeltaDecoder for ChatCompletionDecoder {
    fn framing(&self) -> Framing {
        Framing::Sse
    }

    fn decode(&mut self, payload: &str) -> Result<Vec<StreamEvent>, Error> {
        if payload.trim() == "[DONE]" {
            return Ok(vec![StreamEvent::Done]);
        }

        let chunk: ChatCompletionChunk = serde_json::from_str(payload)?;
        if let Some(error) = chunk.error {
            return Err(Error::Provider {
                provider: self.provider.as_str().to_string(),
                status: None,
                code: error.code,
                message: error.message,
            });
        }

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(delta) = choice.delta.content {
                events.push(StreamEvent::ContentDelta { delta });
            }
            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::Finish {
                    finish_reason: FinishReason::from_vendor(&reason),
                });
            }
        }
        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Usage {
                usage: usage.into(),
            });
        }
        Ok(events)
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn available_models(&self) -> Vec<String> {
        self.models().iter().map(|m| m.to_string()).collect()
    }

    fn default_model(&self) -> &str {
        match self.kind {
            ProviderKind::Groq => "llama-3.1-8b-instant",
            _ => "gpt-4o-mini",
        }
    }

    fn features(&self) -> &'static [Feature] {
        match self.kind {
            ProviderKind::Groq => &[
                Feature::Chat,
                Feature::Streaming,
                Feature::SystemPrompt,
                Feature::OpenSource,
                Feature::FastInference,
            ],
            _ => &[
                Feature::Chat,
                Feature::Streaming,
                Feature::SystemPrompt,
                Feature::LongContext,
                Feature::Vision,
            ],
        }
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn rate_limit_description(&self) -> &'static str {
        match self.kind {
            ProviderKind::Groq => "30 requests/min on the free tier",
            _ => "Tier dependent, 500+ requests/min",
        }
    }

    async fn generate_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, Error> {
        let started = Instant::now();
        let body = Self::convert_request(model, messages, settings, false);
        let response: ChatCompletionResponse = self.send(&body).await?.json().await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            Error::provider(self.kind.as_str(), "response contained no choices")
        })?;
        let content = choice.message.content.unwrap_or_default();
        let usage = response
            .usage
            .map(Usage::from)
            .unwrap_or_else(|| Usage::estimate(messages, &content));

        debug!(provider = %self.kind, model, tokens = usage.total_tokens, "completion received");

        Ok(GenerationResult {
            content,
            usage,
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or_default(),
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: self.kind.as_str().to_string(),
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

        let mut decoder = ChatCompletionDecoder {
            provider: self.kind,
        };
        let accumulator = decode_stream(response.bytes_stream(), &mut decoder, on_chunk).await?;
        Ok(accumulator.finalize(self.kind.as_str(), model, messages, started))
    }
}
