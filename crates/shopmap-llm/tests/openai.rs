//! Integration tests for `OpenAiClient` using wiremock HTTP mocks.

use std::time::Duration;

use shopmap_llm::{GenerationRequest, LlmError, OpenAiClient};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str, timeout_secs: u64) -> OpenAiClient {
    OpenAiClient::with_base_url("sk-test", "gpt-4-turbo", timeout_secs, base_url)
        .expect("client construction should not fail")
}

fn completion_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4-turbo-2024-04-09",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }
        ],
        "usage": { "prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42 }
    })
}

#[tokio::test]
async fn generate_returns_text_usage_and_finish_reason() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4-turbo",
            "max_tokens": 1000,
            "messages": [{ "role": "user", "content": "Describe a blue mug" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("A sturdy blue mug.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 30);
    let response = client
        .generate(&GenerationRequest::new("Describe a blue mug"))
        .await
        .expect("generation should succeed");

    assert_eq!(response.text, "A sturdy blue mug.");
    assert_eq!(response.model, "gpt-4-turbo-2024-04-09");
    assert_eq!(response.tokens.prompt, 12);
    assert_eq!(response.tokens.completion, 30);
    assert_eq!(response.tokens.total, 42);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn request_model_overrides_configured_model() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = GenerationRequest::new("hi");
    request.model = Some("gpt-4o-mini".to_string());

    let response = test_client(&server.uri(), 30)
        .generate(&request)
        .await
        .expect("generation should succeed");

    // Without a model in the body, the requested one is reported.
    assert_eq!(response.model, "gpt-4o-mini");
    assert_eq!(response.tokens.total, 0);
}

#[tokio::test]
async fn error_status_is_surfaced_as_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": {
                "message": "max_tokens is too large",
                "type": "invalid_request_error",
                "param": "max_tokens",
                "code": null
            }
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 30)
        .generate(&GenerationRequest::new("hi"))
        .await
        .expect_err("should fail");

    match err {
        LlmError::Api {
            status,
            error_type,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(error_type, "invalid_request_error");
            assert_eq!(message, "max_tokens is too large");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_reads_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 30)
        .generate(&GenerationRequest::new("hi"))
        .await
        .expect_err("should be rate limited");
    assert!(matches!(err, LlmError::RateLimited(17)), "got {err:?}");
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 30)
        .generate(&GenerationRequest::new("hi"))
        .await
        .expect_err("should fail to parse");
    assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn null_completion_content_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-4-turbo",
            "choices": [{
                "message": { "role": "assistant", "content": null },
                "finish_reason": "content_filter"
            }]
        })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 30)
        .generate(&GenerationRequest::new("hi"))
        .await
        .expect_err("empty completion should fail");
    assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("too late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = test_client(&server.uri(), 1)
        .generate(&GenerationRequest::new("hi"))
        .await
        .expect_err("should time out");
    assert!(matches!(err, LlmError::Timeout), "got {err:?}");
}
