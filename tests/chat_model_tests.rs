//! OpenAI-compatible chat transport against a local mock server

use gmail_triage::agent::{ChatMessage, ChatModel, OpenAiCompatibleModel};
use gmail_triage::error::TriageError;
use gmail_triage::tools::{json_schema, ToolDefinition};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(message: serde_json::Value, finish_reason: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gemini-2.5-flash",
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": finish_reason
        }],
        "usage": {
            "prompt_tokens": 42,
            "completion_tokens": 7,
            "total_tokens": 49
        }
    })
}

fn search_tool() -> ToolDefinition {
    ToolDefinition {
        name: "search_gmail".to_string(),
        description: "Search Gmail".to_string(),
        input_schema: json_schema(json!({"query": {"type": "string"}}), vec!["query"]),
    }
}

fn model(server: &MockServer) -> OpenAiCompatibleModel {
    OpenAiCompatibleModel::new("test-key", server.uri(), "gemini-2.5-flash", 1.0)
}

#[tokio::test]
async fn test_tool_calls_are_parsed() {
    let server = MockServer::start().await;

    let response = completion(
        json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {
                    "name": "search_gmail",
                    "arguments": "{\"query\": \"category:promotions\"}"
                }
            }]
        }),
        "tool_calls",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gemini-2.5-flash",
            "tools": [{"type": "function", "function": {"name": "search_gmail"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
        .mount(&server)
        .await;

    let reply = model(&server)
        .chat(
            &[
                ChatMessage::system("You triage email."),
                ChatMessage::user("find promotions"),
            ],
            &[search_tool()],
        )
        .await
        .unwrap();

    assert!(reply.text.is_none());
    assert_eq!(reply.tool_calls.len(), 1);
    assert_eq!(reply.tool_calls[0].id, "call_1");
    assert_eq!(reply.tool_calls[0].name, "search_gmail");
    assert_eq!(
        reply.tool_calls[0].arguments,
        json!({"query": "category:promotions"})
    );
}

#[tokio::test]
async fn test_plain_text_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            json!({"role": "assistant", "content": "Nothing to delete today."}),
            "stop",
        )))
        .mount(&server)
        .await;

    let reply = model(&server)
        .chat(&[ChatMessage::user("anything to clean?")], &[])
        .await
        .unwrap();

    assert_eq!(reply.text.as_deref(), Some("Nothing to delete today."));
    assert!(reply.tool_calls.is_empty());
}

#[tokio::test]
async fn test_api_error_maps_to_llm_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "API key not valid. Please pass a valid API key.",
                "type": "invalid_request_error",
                "param": null,
                "code": "400"
            }
        })))
        .mount(&server)
        .await;

    let err = model(&server)
        .chat(&[ChatMessage::user("hello")], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::LlmError(_)));
    assert!(err.to_string().contains("API key not valid"));
}
