use super::{ProviderCase, ProviderTestSetup, ANSWER};
use llm_gateway::{HuggingFaceProvider, Provider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct HuggingFaceTestSetup;

#[async_trait::async_trait]
impl ProviderTestSetup for HuggingFaceTestSetup {
    fn get_config() -> ProviderCase {
        ProviderCase {
            name: "huggingface",
            model: "mistralai/Mistral-7B-Instruct-v0.2",
            native_streaming: false,
            reports_usage: false,
        }
    }

    fn create_provider(base_url: &str) -> Provider {
        let provider = HuggingFaceProvider::new_with_base_url(
            Some("test-api-key".to_string()),
            base_url.to_string(),
        )
        .expect("Failed to create Hugging Face provider");
        Provider::HuggingFace(provider)
    }

    fn generation_path() -> String {
        "/models/mistralai/Mistral-7B-Instruct-v0.2".to_string()
    }

    async fn mount_generation_mocks(mock_server: &MockServer) {
        // Continuation models answer with a role prefix and an end-of-sequence token
        Mock::given(method("POST"))
            .and(path(Self::generation_path()))
            .and(header("authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({
                "parameters": {"max_new_tokens": 64},
                "options": {"wait_for_model": true}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"generated_text": format!(" Assistant: {ANSWER}</s>")}
            ])))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    async fn mount_streaming_mocks(mock_server: &MockServer) {
        // No native stream: the adapter replays one complete generation
        Mock::given(method("POST"))
            .and(path(Self::generation_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"generated_text": ANSWER}
            ])))
            .expect(1)
            .mount(mock_server)
            .await;
    }
}

