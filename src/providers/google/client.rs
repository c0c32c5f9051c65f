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

const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const MODELS: &[&str] = &[
    "gemini-1.5-pro",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-2.0-flash",
];

/// Google Gemini provider implementation.
pub struct GoogleProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleProvider {
    /// Create a new Google provider.
    pub fn new(api_key: Option<String>) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, GOOGLE_BASE_URL.to_string())
    }

    /// Create a new Google provider with custom base URL (for testing).
    pub fn new_with_base_url(api_key: Option<String>, base_url: String) -> Result<Self, Error> {
        Ok(Self {
            client: http_client(HOSTED_TIMEOUT)?,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert canonical messages to Gemini format.
    ///
    /// Gemini calls the assistant role `model` and takes system text through
    /// `systemInstruction`.
    fn convert_request(messages: &[Message], settings: &GenerationSettings) -> GoogleRequest {
        let split = split_system(messages);
        let contents = split
            .turns
            .iter()
            .map(|msg| GoogleContent {
                role: Some(
                    match msg.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![GooglePart::text(msg.content.clone())],
            })
            .collect();

        GoogleRequest {
            contents,
            system_instruction: split.system.map(|text| GoogleContent {
                role: None,
                parts: vec![GooglePart::text(text)],
            }),
            generation_config: GoogleGenerationConfig {
                temperature: settings.temperature,
                top_p: settings.top_p,
                top_k: settings.top_k,
                max_output_tokens: settings.max_tokens,
                stop_sequences: settings.stop_sequences(),
            },
        }
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        if stream {
            format!(
                "{}/v1beta/models/{model}:streamGenerateContent?alt=sse",
                self.base_url
            )
        } else {
            format!("{}/v1beta/models/{model}:generateContent", self.base_url)
        }
    }

    async fn send(&self, url: String, body: &GoogleRequest) -> Result<reqwest::Response, Error> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::config("Google API key is not configured"))?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        check_status(ProviderKind::Google, response).await
    }
}

/// Each SSE payload is a partial `GenerateContentResponse`; the stream ends
/// when the body closes.
struct GenerateContentDecoder;

impl DeltaDecoder for GenerateContentDecoder {
    fn framing(&self) -> Framing {
        Framing::Sse
    }

    fn decode(&mut self, payload: &str) -> Result<Vec<StreamEvent>, Error> {
        let response: GoogleResponse = serde_json::from_str(payload)?;

        let mut events = Vec::new();
        let text = response.text();
        if !text.is_empty() {
            events.push(StreamEvent::ContentDelta { delta: text });
        }
        if let Some(reason) = response.finish_reason() {
            events.push(StreamEvent::Finish {
                finish_reason: FinishReason::from_vendor(reason),
            });
        }
        if let Some(usage) = response.usage_metadata {
            events.push(StreamEvent::Usage {
                usage: usage.into(),
            });
        }
        Ok(events)
    }
}

#[async_trait::async_trait]
impl LLMProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn available_models(&self) -> Vec<String> {
        MODELS.iter().map(|m| m.to_string()).collect()
    }

    fn default_model(&self) -> &str {
        "gemini-1.5-flash"
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
        "15 requests/min on the free tier"
    }

    async fn generate_response(
        &self,
        model: &str,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<GenerationResult, Error> {
        let started = Instant::now();
        let body = Self::convert_request(messages, settings);
        let response: GoogleResponse = self
            .send(self.endpoint(model, false), &body)
            .await?
            .json()
            .await?;

        let content = response.text();
        let finish_reason = response
            .finish_reason()
            .map(FinishReason::from_vendor)
            .unwrap_or_default();
        let usage = response
            .usage_metadata
            .map(Usage::from)
            .filter(|usage| usage.total_tokens > 0)
            .unwrap_or_else(|| Usage::estimate(messages, &content));

        debug!(model, tokens = usage.total_tokens, "gemini content received");

        Ok(GenerationResult {
            content,
            usage,
            finish_reason,
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: ProviderKind::Google.as_str().to_string(),
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
        let body = Self::convert_request(messages, settings);
        let response = self.send(self.endpoint(model, true), &body).await?;

        let accumulator =
            decode_stream(response.bytes_stream(), &mut GenerateContentDecoder, on_chunk).await?;
        Ok(accumulator.finalize(ProviderKind::Google.as_str(), model, messages, started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_conversion() {
        let messages = vec![
            Message::system("Answer in French."),
            Message::user("Hello"),
            Message::assistant("Bonjour"),
            Message::user("How are you?"),
        ];
        let settings = GenerationSettings {
            temperature: 0.0,
            max_tokens: 10,
            ..Default::default()
        };
        let request = GoogleProvider::convert_request(&messages, &settings);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Answer in French.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
        assert_eq!(json["generationConfig"]["topK"], 40);
    }

    #[test]
    fn test_endpoints() {
        let provider =
            GoogleProvider::new_with_base_url(Some("k".into()), "http://localhost/".into()).unwrap();
        assert_eq!(
            provider.endpoint("gemini-1.5-flash", false),
            "http://localhost/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(
            provider.endpoint("gemini-1.5-flash", true),
            "http://localhost/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_decoder_payloads() {
        let mut decoder = GenerateContentDecoder;

        let events = decoder
            .decode(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Bon"},{"text":"jour"}]}}]}"#)
            .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ContentDelta {
                delta: "Bonjour".to_string()
            }]
        );

        let events = decoder
            .decode(r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"!"}]},"finishReason":"STOP"}],
                        "usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2,"totalTokenCount":6}}"#)
            .unwrap();
        assert_eq!(
            events,
            vec![
                StreamEvent::ContentDelta {
                    delta: "!".to_string()
                },
                StreamEvent::Finish {
                    finish_reason: FinishReason::Stop
                },
                StreamEvent::Usage {
                    usage: Usage::new(4, 2)
                },
            ]
        );
    }

    #[test]
    fn test_blocked_prompt_maps_to_content_filter() {
        let response: GoogleResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(response.text(), "");
        assert_eq!(
            response.finish_reason().map(FinishReason::from_vendor),
            Some(FinishReason::ContentFilter)
        );
    }
}
