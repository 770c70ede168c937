//! Integration tests for `LlmClient` using wiremock HTTP mocks.

use postdeck_ai::LlmClient;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn complete_returns_assistant_text() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "choices": [
            { "message": { "role": "assistant", "content": "  Fresh roast, who dis?  " } }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = LlmClient::new(&server.uri(), "sk-test", "gpt-4o-mini")
        .expect("client construction should not fail");
    let text = client
        .complete("You write captions.", "Write one about coffee.")
        .await
        .expect("should return text");

    assert_eq!(text, "Fresh roast, who dis?", "content should be trimmed");
}

#[tokio::test]
async fn empty_content_is_an_error() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "choices": [ { "message": { "role": "assistant", "content": "" } } ]
    });

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = LlmClient::new(&server.uri(), "sk-test", "gpt-4o-mini").unwrap();
    let result = client.complete("sys", "user").await;
    assert!(matches!(result, Err(postdeck_ai::LlmError::EmptyResponse)));
}

#[tokio::test]
async fn non_2xx_surfaces_api_error_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({ "error": { "message": "rate limited" } })),
        )
        .mount(&server)
        .await;

    let client = LlmClient::new(&server.uri(), "sk-test", "gpt-4o-mini").unwrap();
    let err = client.complete("sys", "user").await.unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("429") && msg.contains("rate limited"),
        "expected status and body in error, got: {msg}"
    );
}
