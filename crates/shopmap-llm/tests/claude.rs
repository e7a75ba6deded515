//! Integration tests for `ClaudeClient` and provider routing through
//! `LlmService`, using wiremock HTTP mocks.

use shopmap_core::LlmSettings;
use shopmap_llm::{
    product_description_request, ClaudeClient, DescriptionLength, DescriptionPrompt,
    GenerationRequest, LlmError, LlmProvider, LlmService,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn messages_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-3-opus-20240229",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 20, "output_tokens": 15 }
    })
}

#[tokio::test]
async fn generate_sends_anthropic_headers_and_sums_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-opus-20240229",
            "messages": [{ "role": "user", "content": "hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_body("Hi there.")))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        ClaudeClient::with_base_url("sk-ant-test", "claude-3-opus-20240229", 30, &server.uri())
            .expect("client");
    let response = client
        .generate(&GenerationRequest::new("hello"))
        .await
        .expect("generation should succeed");

    assert_eq!(response.text, "Hi there.");
    assert_eq!(response.model, "claude-3-opus-20240229");
    assert_eq!(response.tokens.prompt, 20);
    assert_eq!(response.tokens.completion, 15);
    assert_eq!(response.tokens.total, 35);
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
}

#[tokio::test]
async fn unauthorized_status_maps_to_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "type": "error",
            "error": { "type": "authentication_error", "message": "invalid x-api-key" }
        })))
        .mount(&server)
        .await;

    let client = ClaudeClient::with_base_url("bad", "claude-3-opus-20240229", 30, &server.uri())
        .expect("client");
    let err = client
        .generate(&GenerationRequest::new("hello"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, LlmError::Unauthorized(_)), "got {err:?}");
}

#[tokio::test]
async fn reply_without_text_blocks_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_body("   ")))
        .mount(&server)
        .await;

    let client = ClaudeClient::with_base_url("key", "claude-3-opus-20240229", 30, &server.uri())
        .expect("client");
    let err = client
        .generate(&GenerationRequest::new("hello"))
        .await
        .expect_err("blank reply should fail");
    assert!(matches!(err, LlmError::Parse(_)), "got {err:?}");
}

fn settings_for(server_uri: &str) -> LlmSettings {
    LlmSettings {
        default_provider: LlmProvider::OpenAi,
        openai_api_key: None,
        anthropic_api_key: Some("sk-ant-test".to_string()),
        openai_model: "gpt-4-turbo".to_string(),
        claude_model: "claude-3-opus-20240229".to_string(),
        openai_base_url: server_uri.to_string(),
        anthropic_base_url: server_uri.to_string(),
        timeout_secs: 30,
    }
}

#[tokio::test]
async fn service_routes_description_prompt_to_requested_provider() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(serde_json::json!({ "max_tokens": 500 })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(messages_body("A bright blue mug.")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = LlmService::from_settings(&settings_for(&server.uri())).expect("service");
    let request = product_description_request(&DescriptionPrompt {
        title: "Blue Mug".to_string(),
        category: Some("Kitchen".to_string()),
        key_points: Vec::new(),
        tone: "casual".to_string(),
        length: DescriptionLength::Short,
    });

    let response = service
        .generate(Some(LlmProvider::Claude), &request)
        .await
        .expect("claude is configured");
    assert_eq!(response.text, "A bright blue mug.");

    // The default provider (openai) has no key.
    let err = service
        .generate(None, &request)
        .await
        .expect_err("openai is not configured");
    assert!(matches!(err, LlmError::NotConfigured(LlmProvider::OpenAi)));
}
