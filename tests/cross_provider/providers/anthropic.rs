use super::{sse_body, ProviderCase, ProviderTestSetup, ANSWER, ANSWER_DELTAS, QUESTION, SYSTEM_PROMPT};
use llm_gateway::{AnthropicProvider, Provider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct AnthropicTestSetup;

fn event(name: &str, data: serde_json::Value) -> String {
    format!("event: {name}\ndata: {data}")
}

#[async_trait::async_trait]
impl ProviderTestSetup for AnthropicTestSetup {
    fn get_config() -> ProviderCase {
        ProviderCase {
            name: "anthropic",
            model: "claude-3-5-haiku-20241022",
            native_streaming: true,
            reports_usage: true,
        }
    }

    fn create_provider(base_url: &str) -> Provider {
        let provider = AnthropicProvider::new_with_base_url(
            Some("test-api-key".to_string()),
            base_url.to_string(),
        )
        .expect("Failed to create Anthropic provider");
        Provider::Anthropic(provider)
    }

    fn generation_path() -> String {
        "/v1/messages".to_string()
    }

    async fn mount_generation_mocks(mock_server: &MockServer) {
        // The system prompt travels outside the message list
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-3-5-haiku-20241022",
                "system": SYSTEM_PROMPT,
                "messages": [{"role": "user", "content": QUESTION}],
                "max_tokens": 64
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_123",
                "type": "message",
                "role": "assistant",
                "model": "claude-3-5-haiku-20241022",
                "content": [{"type": "text", "text": ANSWER}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 14, "output_tokens": 7}
            })))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        let mut events = vec![
            event(
                "message_start",
                json!({
                    "type": "message_start",
                    "message": {
                        "id": "msg_123",
                        "type": "message",
                        "role": "assistant",
                        "content": [],
                        "usage": {"input_tokens": 14, "output_tokens": 1}
                    }
                }),
            ),
            event(
                "content_block_start",
                json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            ),
            event("ping", json!({"type": "ping"})),
        ];
        for delta in ANSWER_DELTAS {
            events.push(event(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": delta}}),
            ));
        }
        events.extend([
            event("content_block_stop", json!({"type": "content_block_stop", "index": 0})),
            event(
                "message_delta",
                json!({
                    "type": "message_delta",
                    "delta": {"stop_reason": "end_turn", "stop_sequence": null},
                    "usage": {"output_tokens": 7}
                }),
            ),
            event("message_stop", json!({"type": "message_stop"})),
        ]);

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&events), "text/event-stream"))
            .expect(1)
            .mount(mock_server)
            .await;
    }
}
