use llm_gateway::{Error, FinishReason, LLMProvider};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::providers::{
    anthropic::AnthropicTestSetup,
    conversation,
    google::GoogleTestSetup,
    huggingface::HuggingFaceTestSetup,
    ollama::OllamaTestSetup,
    openai::{GroqTestSetup, OpenAITestSetup},
    settings, ProviderTestSetup, ANSWER, ANSWER_DELTAS,
};

/// One complete generation through the adapter's non-streaming path.
async fn run_generation_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_generation_mocks(&mock_server).await;

    let provider = T::create_provider(&mock_server.uri());
    assert!(provider.is_available());

    let result = provider
        .generate_response(config.model, &conversation(), &settings())
        .await
        .unwrap_or_else(|e| panic!("{} generation failed: {e}", config.name));

    assert_eq!(result.content, ANSWER);
    assert_eq!(result.provider, config.name);
    assert_eq!(result.model, config.model);
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert!(!result.from_cache);
    if config.reports_usage {
        assert_eq!(result.usage.prompt_tokens, 14);
        assert_eq!(result.usage.completion_tokens, 7);
    }
    assert!(result.usage.total_tokens > 0);
    assert_eq!(
        result.usage.total_tokens,
        result.usage.prompt_tokens + result.usage.completion_tokens
    );
}

/// Stream a generation and check the chunks rebuild the content.
async fn run_streaming_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_streaming_mocks(&mock_server).await;

    let provider = T::create_provider(&mock_server.uri());
    assert_eq!(provider.supports_streaming(), config.native_streaming);

    let chunks = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = chunks.clone();
    let mut on_chunk = move |chunk: &str| sink.lock().unwrap().push(chunk.to_string());

    let result = provider
        .generate_streaming_response(config.model, &conversation(), &settings(), &mut on_chunk)
        .await
        .unwrap_or_else(|e| panic!("{} streaming failed: {e}", config.name));

    let chunks = chunks.lock().unwrap();
    assert_eq!(chunks.concat(), result.content);
    assert_eq!(result.content, ANSWER);
    assert_eq!(result.finish_reason, FinishReason::Stop);
    if config.native_streaming {
        assert_eq!(*chunks, ANSWER_DELTAS);
    } else {
        assert_eq!(chunks.len(), ANSWER.split_whitespace().count());
    }
    if config.reports_usage {
        assert_eq!(result.usage.prompt_tokens, 14);
        assert_eq!(result.usage.completion_tokens, 7);
    }
}

/// Vendor failures surface as typed errors the retry layer can classify.
async fn run_error_test<T: ProviderTestSetup>(status: u16, retryable: bool) {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(T::generation_path()))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": {"code": "test_error", "message": "mocked failure"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = T::create_provider(&mock_server.uri());
    let err = provider
        .generate_response(config.model, &conversation(), &settings())
        .await
        .expect_err("mocked failure should surface");

    assert_eq!(err.status(), Some(status), "{}: {err}", config.name);
    assert_eq!(provider.is_retryable_error(&err), retryable);
    assert!(matches!(err, Error::Provider { .. }));
}

#[tokio::test]
async fn test_openai_generation() {
    run_generation_test::<OpenAITestSetup>().await;
}

#[tokio::test]
async fn test_groq_generation() {
    run_generation_test::<GroqTestSetup>().await;
}

#[tokio::test]
async fn test_anthropic_generation() {
    run_generation_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_google_generation() {
    run_generation_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_huggingface_generation() {
    run_generation_test::<HuggingFaceTestSetup>().await;
}

#[tokio::test]
async fn test_ollama_generation() {
    run_generation_test::<OllamaTestSetup>().await;
}

#[tokio::test]
async fn test_openai_streaming() {
    run_streaming_test::<OpenAITestSetup>().await;
}

#[tokio::test]
async fn test_groq_streaming() {
    run_streaming_test::<GroqTestSetup>().await;
}

#[tokio::test]
async fn test_anthropic_streaming() {
    run_streaming_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_google_streaming() {
    run_streaming_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_huggingface_streaming_is_synthesized() {
    run_streaming_test::<HuggingFaceTestSetup>().await;
}

#[tokio::test]
async fn test_ollama_streaming() {
    run_streaming_test::<OllamaTestSetup>().await;
}

#[tokio::test]
async fn test_server_errors_are_retryable() {
    run_error_test::<OpenAITestSetup>(503, true).await;
    run_error_test::<AnthropicTestSetup>(529, true).await;
    run_error_test::<GoogleTestSetup>(500, true).await;
    run_error_test::<HuggingFaceTestSetup>(503, true).await;
    run_error_test::<OllamaTestSetup>(502, true).await;
}

#[tokio::test]
async fn test_throttling_is_retryable() {
    run_error_test::<GroqTestSetup>(429, true).await;
    run_error_test::<GoogleTestSetup>(429, true).await;
}

#[tokio::test]
async fn test_client_errors_are_terminal() {
    run_error_test::<OpenAITestSetup>(401, false).await;
    run_error_test::<AnthropicTestSetup>(400, false).await;
    run_error_test::<GoogleTestSetup>(403, false).await;
    run_error_test::<OllamaTestSetup>(404, false).await;
}
