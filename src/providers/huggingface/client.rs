use super::shaping::{clean_continuation, InputShape};
use super::types::*;
use crate::provider::LLMProvider;
use crate::providers::{check_status, http_client, ProviderKind, HOSTED_TIMEOUT};
use crate::response::{FinishReason, GenerationResult, Usage};
use crate::types::{Feature, GenerationSettings, Message};
use crate::Error;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

const HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co";

const MODELS: &[&str] = &[
    "mistralai/Mistral-7B-Instruct-v0.2",
    "HuggingFaceH4/zephyr-7b-beta",
    "google/flan-t5-xxl",
    "microsoft/DialoGPT-large",
];

/// Hugging Face Inference API provider.
///
/// The API has no incremental output, so streaming is synthesized by the
/// default [`LLMProvider::generate_streaming_response`].
pub struct HuggingFaceProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl HuggingFaceProvider {
    pub fn new(api_key: Option<String>) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, HUGGINGFACE_BASE_URL.to_string())
    }

    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(HOSTED_TIMEOUT)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn convert_request(
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> HuggingFaceRequest {
        let greedy = settings.is_deterministic();
        HuggingFaceRequest {
            inputs: InputShape::for_model(model).build_inputs(messages),
            parameters: HuggingFaceParameters {
                temperature: (!greedy).then_some(settings.temperature),
                top_p: settings.top_p,
                top_k: settings.top_k,
                max_new_tokens: settings.max_tokens,
                return_full_text: false,
                stop: settings.stop_sequences(),
                do_sample: !greedy,
            },
            options: HuggingFaceOptions {
                wait_for_model: true,
            },
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn available_models(&self) -> Vec<String> {
        MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn default_model(&self) -> &str {
        "mistralai/Mistral-7B-Instruct-v0.2"
    }

    fn features(&self) -> &'static [Feature] {
        &[Feature::Chat, Feature::OpenSource]
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn rate_limit_description(&self) -> &'static str {
        "Shared free inference, roughly 30 requests/min"
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
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::config("Hugging Face API key is not configured"))?;

        let started = Instant::now();
        let body = Self::convert_request(model, messages, settings);

        let response = self
            .client
            .post(format!("{}/models/{model}", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let response: HuggingFaceResponse = check_status(ProviderKind::HuggingFace, response)
            .await?
            .json()
            .await?;

        let raw = response
            .into_text()
            .ok_or_else(|| Error::provider(ProviderKind::HuggingFace.as_str(), "empty generation"))?;
        let content = clean_continuation(&raw, body.inputs.echo_prefix());

        debug!(model, raw_len = raw.len(), cleaned_len = content.len(), "continuation cleaned");

        Ok(GenerationResult {
            usage: Usage::estimate(messages, &content),
            content,
            finish_reason: FinishReason::Stop,
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: ProviderKind::HuggingFace.as_str().to_string(),
            model: model.to_string(),
            from_cache: false,
        })
    }
}
