use super::{ProviderCase, ProviderTestSetup, ANSWER, ANSWER_DELTAS, QUESTION, SYSTEM_PROMPT};
use llm_gateway::{OllamaProvider, Provider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OllamaTestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for OllamaTestSetup {
    fn get_config() -> ProviderCase {
        ProviderCase {
            name: "ollama",
            model: "llama3.2",
            native_streaming: true,
            reports_usage: true,
        }
    }

    fn create_provider(base_url: &str) -> Provider {
        let provider = OllamaProvider::new(Some(base_url.to_string()))
            .expect("Failed to create Ollama provider");
        Provider::Ollama(provider)
    }

    fn generation_path() -> String {
        "/api/chat".to_string()
    }

    async fn mount_generation_mocks(mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.2",
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": QUESTION}
                ],
                "stream": false,
                "options": {"num_predict": 64}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "created_at": "2024-11-20T10:00:00Z",
                "message": {"role": "assistant", "content": ANSWER},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 14,
                "eval_count": 7
            })))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        let mut lines: Vec<String> = ANSWER_DELTAS
            .iter()
            .map(|delta| {
                json!({
                    "model": "llama3.2",
                    "message": {"role": "assistant", "content": delta},
                    "done": false
                })
                .to_string()
            })
            .collect();
        lines.push(
            json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": ""},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 14,
                "eval_count": 7
            })
            .to_string(),
        );

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(lines.join("\n") + "\n", "application/x-ndjson"),
            )
            .expect(1)
            .mount(mock_server)
            .await;
    }
}
