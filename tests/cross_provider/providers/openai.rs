use super::{sse_body, ProviderCase, ProviderTestSetup, ANSWER, ANSWER_DELTAS, QUESTION, SYSTEM_PROMPT};
use llm_gateway::{OpenAIProvider, Provider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct OpenAITestSetup;
pub struct GroqTestSetup;

pub fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 14, "completion_tokens": 7, "total_tokens": 21}
    })
}

pub fn completion_stream_body(deltas: &[&str]) -> String {
    let mut events = vec![format!(
        "data: {}",
        json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]})
    )];
    for (i, delta) in deltas.iter().enumerate() {
        let finish_reason = (i + 1 == deltas.len()).then_some("stop");
        events.push(format!(
            "data: {}",
            json!({"choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": finish_reason}]})
        ));
    }
    events.push(format!(
        "data: {}",
        json!({"choices": [], "usage": {"prompt_tokens": 14, "completion_tokens": 7, "total_tokens": 21}})
    ));
    events.push("data: [DONE]".to_string());
    sse_body(&events)
}

async fn mount_generation(mock_server: &MockServer, api_key: &str, model: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {api_key}").as_str()))
        .and(body_partial_json(json!({
            "model": model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": QUESTION}
            ],
            "max_tokens": 64,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(ANSWER)))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn mount_streaming(mock_server: &MockServer, model: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": model,
            "stream": true,
            "stream_options": {"include_usage": true}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(completion_stream_body(&ANSWER_DELTAS), "text/event-stream"),
        )
        .expect(1)
        .mount(mock_server)
        .await;
}

#[async_trait::async_trait]
impl ProviderTestSetup for OpenAITestSetup {
    fn get_config() -> ProviderCase {
        ProviderCase {
            name: "openai",
            model: "gpt-4o-mini",
            native_streaming: true,
            reports_usage: true,
        }
    }

    fn create_provider(base_url: &str) -> Provider {
        let provider =
            OpenAIProvider::new_with_base_url(Some("test-api-key".to_string()), base_url.to_string())
                .expect("Failed to create OpenAI provider");
        Provider::OpenAI(provider)
    }

    fn generation_path() -> String {
        "/chat/completions".to_string()
    }

    async fn mount_generation_mocks(mock_server: &MockServer) {
        mount_generation(mock_server, "test-api-key", Self::get_config().model).await;
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        mount_streaming(mock_server, Self::get_config().model).await;
    }
}

#[async_trait::async_trait]
impl ProviderTestSetup for GroqTestSetup {
    fn get_config() -> ProviderCase {
        ProviderCase {
            name: "groq",
            model: "llama-3.1-8b-instant",
            native_streaming: true,
            reports_usage: true,
        }
    }

    fn create_provider(base_url: &str) -> Provider {
        let provider =
            OpenAIProvider::groq_with_base_url(Some("test-groq-key".to_string()), base_url.to_string())
                .expect("Failed to create Groq provider");
        Provider::Groq(provider)
    }

    fn generation_path() -> String {
        "/chat/completions".to_string()
    }

    async fn mount_generation_mocks(mock_server: &MockServer) {
        mount_generation(mock_server, "test-groq-key", Self::get_config().model).await;
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        mount_streaming(mock_server, Self::get_config().model).await;
    }
}
