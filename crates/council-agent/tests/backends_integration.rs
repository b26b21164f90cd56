#![allow(clippy::unwrap_used, clippy::expect_used)]

//! HTTP-level tests for the provider backends against a mock server.

use council_agent::{CompletionGateway, EngineConfig, LlmProvider, RetryPolicy};
use council_core::CouncilError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine(id: &str, provider: LlmProvider, server: &MockServer) -> EngineConfig {
    let mut config = EngineConfig::new(id, provider, "test-model");
    config.api_key = "test-key".into();
    config.api_base_url = Some(server.uri());
    config
}

#[tokio::test]
async fn openai_compatible_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-model",
            "messages": [{ "role": "user", "content": "pick one" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Nova" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway =
        CompletionGateway::from_configs(vec![engine("gpt", LlmProvider::OpenAi, &server)]).unwrap();
    assert_eq!(gateway.complete("gpt", "pick one").await.unwrap(), "Nova");
}

#[tokio::test]
async fn claude_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "A definitive answer." }],
            "stop_reason": "end_turn"
        })))
        .mount(&server)
        .await;

    let gateway =
        CompletionGateway::from_configs(vec![engine("claude", LlmProvider::Claude, &server)])
            .unwrap();
    assert_eq!(
        gateway.complete("claude", "synthesize").await.unwrap(),
        "A definitive answer."
    );
}

#[tokio::test]
async fn provider_error_is_completion_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "error": { "message": "bad key" } })),
        )
        .mount(&server)
        .await;

    let gateway =
        CompletionGateway::from_configs(vec![engine("gpt", LlmProvider::OpenAi, &server)]).unwrap();
    let err = gateway.complete("gpt", "hello").await.unwrap_err();
    assert!(matches!(err, CouncilError::CompletionUnavailable(_)));
    assert!(err.to_string().contains("HTTP 401 from OpenAI API"));
}

#[tokio::test]
async fn retry_policy_recovers_from_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "recovered" } }]
        })))
        .mount(&server)
        .await;

    let mut config = engine("gpt", LlmProvider::Groq, &server);
    config.retry_policy = Some(RetryPolicy {
        max_retries: 2,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
    });
    let gateway = CompletionGateway::from_configs(vec![config]).unwrap();
    assert_eq!(gateway.complete("gpt", "hello").await.unwrap(), "recovered");
}

#[tokio::test]
async fn plain_text_server_error_keeps_status_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("upstream overloaded, max_tokens 4000"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "second try" }]
        })))
        .mount(&server)
        .await;

    let mut config = engine("claude", LlmProvider::Claude, &server);
    config.retry_policy = Some(RetryPolicy {
        max_retries: 2,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
    });
    let gateway = CompletionGateway::from_configs(vec![config]).unwrap();
    assert_eq!(gateway.complete("claude", "hello").await.unwrap(), "second try");
}

#[tokio::test]
async fn complete_once_skips_retry_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = engine("gpt", LlmProvider::OpenAi, &server);
    config.retry_policy = Some(RetryPolicy {
        max_retries: 3,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
    });
    let gateway = CompletionGateway::from_configs(vec![config]).unwrap();
    let err = gateway.complete_once("gpt", "route").await.unwrap_err();
    assert!(err.to_string().contains("HTTP 503 from OpenAI API: busy"));
}

#[tokio::test]
async fn unreachable_backend_is_completion_unavailable() {
    let mut config = EngineConfig::new("local", LlmProvider::Ollama, "llama3");
    // Point to a non-routable address so the HTTP client fails fast
    config.api_base_url = Some("http://127.0.0.1:1".into());
    let gateway = CompletionGateway::from_configs(vec![config]).unwrap();
    let err = gateway.complete("local", "hello").await.unwrap_err();
    assert!(matches!(err, CouncilError::CompletionUnavailable(_)));
}
