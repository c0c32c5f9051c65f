use super::{sse_body, ProviderCase, ProviderTestSetup, ANSWER, ANSWER_DELTAS, QUESTION, SYSTEM_PROMPT};
use llm_gateway::{GoogleProvider, Provider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct GoogleTestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for GoogleTestSetup {
    fn get_config() -> ProviderCase {
        ProviderCase {
            name: "google",
            model: "gemini-1.5-flash",
            native_streaming: true,
            reports_usage: true,
        }
    }

    fn create_provider(base_url: &str) -> Provider {
        let provider =
            GoogleProvider::new_with_base_url(Some("test-api-key".to_string()), base_url.to_string())
                .expect("Failed to create Google provider");
        Provider::Google(provider)
    }

    fn generation_path() -> String {
        "/v1beta/models/gemini-1.5-flash:generateContent".to_string()
    }

    async fn mount_generation_mocks(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(Self::generation_path()))
            .and(header("x-goog-api-key", "test-api-key"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
                "contents": [{"role": "user", "parts": [{"text": QUESTION}]}],
                "generationConfig": {"maxOutputTokens": 64}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": ANSWER}]},
                    "finishReason": "STOP",
                    "index": 0
                }],
                "usageMetadata": {"promptTokenCount": 14, "candidatesTokenCount": 7, "totalTokenCount": 21}
            })))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        let last = ANSWER_DELTAS.len() - 1;
        let events: Vec<String> = ANSWER_DELTAS
            .iter()
            .enumerate()
            .map(|(i, delta)| {
                let mut chunk = json!({
                    "candidates": [{"content": {"role": "model", "parts": [{"text": delta}]}, "index": 0}]
                });
                if i == last {
                    chunk["candidates"][0]["finishReason"] = json!("STOP");
                    chunk["usageMetadata"] =
                        json!({"promptTokenCount": 14, "candidatesTokenCount": 7, "totalTokenCount": 21});
                }
                format!("data: {chunk}")
            })
            .collect();

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&events), "text/event-stream"))
            .expect(1)
            .mount(mock_server)
            .await;
    }
}
