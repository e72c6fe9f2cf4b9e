//! HTTP-level tests for the provider backends and the analysis client.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use intake_core::{Error, GenerationBackend, GenerationOptions};
use intake_inference::prompts::{STRUCTURE_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT};
use intake_inference::{
    clean_summary, AnalysisClient, AnthropicBackend, AnthropicConfig, OpenAIBackend, OpenAIConfig,
};

fn anthropic(server: &MockServer) -> AnthropicBackend {
    AnthropicBackend::new(AnthropicConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        timeout_seconds: 5,
    })
    .unwrap()
}

fn anthropic_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 10, "output_tokens": 20}
    }))
}

#[tokio::test]
async fn test_anthropic_sends_headers_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "max_tokens": 4096,
            "system": "sys",
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(anthropic_text("hi there"))
        .expect(1)
        .mount(&server)
        .await;

    let out = anthropic(&server)
        .generate_with_system("sys", "hello", GenerationOptions::new(0.2, 4096))
        .await
        .unwrap();
    assert_eq!(out, "hi there");
}

#[tokio::test]
async fn test_anthropic_auth_failure_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let err = anthropic(&server)
        .generate_with_system("sys", "hello", GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)));
}

#[tokio::test]
async fn test_anthropic_overloaded_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = anthropic(&server)
        .generate_with_system("sys", "hello", GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)));
}

#[tokio::test]
async fn test_unreachable_host_is_unavailable() {
    // Nothing listens on the discard port.
    let backend = AnthropicBackend::new(AnthropicConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: "k".to_string(),
        timeout_seconds: 2,
        ..Default::default()
    })
    .unwrap();

    let err = backend
        .generate_with_system("sys", "hello", GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)));
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"temperature": 0.5, "max_tokens": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "done"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAIBackend::new(OpenAIConfig {
        base_url: format!("{}/v1", server.uri()),
        api_key: Some("sk-test".to_string()),
        ..Default::default()
    })
    .unwrap();

    let out = backend
        .generate_with_system("sys", "hi", GenerationOptions::new(0.5, 1024))
        .await
        .unwrap();
    assert_eq!(out, "done");
}

#[tokio::test]
async fn test_analysis_client_end_to_end() {
    let server = MockServer::start().await;
    let blocks = json!([{
        "question": "What are your goals?",
        "original_response": "sell more",
        "improved_response": "Grow online revenue by 30% within twelve months",
        "recommendations": ["Launch a paid search pilot"],
        "flags": ["No baseline revenue given"]
    }]);

    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "system": STRUCTURE_SYSTEM_PROMPT,
            "max_tokens": 4096
        })))
        .respond_with(anthropic_text(&format!("```json\n{}\n```", blocks)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "system": SUMMARY_SYSTEM_PROMPT,
            "max_tokens": 1024
        })))
        .respond_with(anthropic_text(
            "## Executive Summary\n\nParagraph one.\n\n\n\nParagraph two.",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnalysisClient::new(Arc::new(anthropic(&server)));
    let outcome = client
        .analyse("What are your goals?\nsell more")
        .await
        .unwrap();

    assert_eq!(outcome.structured_result.len(), 1);
    assert_eq!(outcome.structured_result[0].flags.len(), 1);
    assert_eq!(
        clean_summary(&outcome.summary),
        "Paragraph one.\n\nParagraph two."
    );
}

#[tokio::test]
async fn test_malformed_structure_skips_summary_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"system": STRUCTURE_SYSTEM_PROMPT})))
        .respond_with(anthropic_text("I could not find any questions."))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"system": SUMMARY_SYSTEM_PROMPT})))
        .respond_with(anthropic_text("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let client = AnalysisClient::new(Arc::new(anthropic(&server)));
    let err = client.analyse("some text").await.unwrap_err();
    assert!(matches!(err, Error::MalformedModelOutput(_)));
}

#[tokio::test]
async fn test_blank_text_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(anthropic_text("[]"))
        .expect(0)
        .mount(&server)
        .await;

    let client = AnalysisClient::new(Arc::new(anthropic(&server)));
    let err = client.analyse("  \n\t ").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
