//! Tests for toolgate-llm: message types, content blocks, providers

use serde_json::json;
use toolgate_llm::*;

// ===========================================================================
// LlmMessage / ContentBlock
// ===========================================================================

#[test]
fn text_message_serializes_as_plain_string() {
    let msg = LlmMessage::user("hello");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value, json!({"role": "user", "content": "hello"}));
}

#[test]
fn block_message_roundtrip() {
    let msg = LlmMessage::blocks("assistant", vec![
        ContentBlock::Text { text: "Reading.".into() },
        ContentBlock::ToolUse { id: "t1".into(), name: "read_file".into(), input: json!({"file_path": "a.txt"}) },
    ]);
    let text = serde_json::to_string(&msg).unwrap();
    assert!(text.contains(r#""type":"tool_use""#));
    let back: LlmMessage = serde_json::from_str(&text).unwrap();
    assert_eq!(back, msg);
}

#[test]
fn tool_result_is_error_skipped_when_none() {
    let block = ContentBlock::ToolResult { tool_use_id: "t1".into(), content: "ok".into(), is_error: None };
    let text = serde_json::to_string(&block).unwrap();
    assert!(!text.contains("is_error"));
}

#[test]
fn message_tool_markers() {
    let use_msg = LlmMessage::blocks("assistant", vec![
        ContentBlock::ToolUse { id: "t1".into(), name: "git_status".into(), input: json!({}) },
    ]);
    let result_msg = LlmMessage::blocks("user", vec![
        ContentBlock::ToolResult { tool_use_id: "t1".into(), content: "clean".into(), is_error: None },
    ]);
    assert!(use_msg.has_tool_use());
    assert!(!use_msg.has_tool_result());
    assert!(result_msg.has_tool_result());
    assert!(!LlmMessage::user("plain").has_tool_use());
}

#[test]
fn message_text_joins_text_blocks() {
    let msg = LlmMessage::blocks("assistant", vec![
        ContentBlock::Text { text: "a".into() },
        ContentBlock::ToolUse { id: "t".into(), name: "list_files".into(), input: json!({}) },
        ContentBlock::Text { text: "b".into() },
    ]);
    assert_eq!(msg.text(), "ab");
    assert_eq!(LlmMessage::assistant("x").text(), "x");
}

#[test]
fn transcript_json_from_disk_parses() {
    let raw = r#"[
        {"role": "user", "content": "hi"},
        {"role": "assistant", "content": [{"type": "text", "text": "hello"}]}
    ]"#;
    let messages: Vec<LlmMessage> = serde_json::from_str(raw).unwrap();
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[1].content, LlmContent::Blocks(_)));
}

// ===========================================================================
// AccumulatedToolCall
// ===========================================================================

#[test]
fn accumulated_arguments_parse() {
    let call = AccumulatedToolCall {
        id: "t".into(),
        name: "read_file".into(),
        arguments: r#"{"file_path": "x"}"#.into(),
    };
    assert_eq!(call.parse_arguments().unwrap()["file_path"], "x");
}

#[test]
fn empty_arguments_are_empty_object() {
    let call = AccumulatedToolCall { id: "t".into(), name: "git_status".into(), arguments: String::new() };
    assert_eq!(call.parse_arguments().unwrap(), json!({}));
}

#[test]
fn truncated_arguments_fail_to_parse() {
    let call = AccumulatedToolCall { id: "t".into(), name: "read_file".into(), arguments: r#"{"file_pa"#.into() };
    assert!(call.parse_arguments().is_err());
}

// ===========================================================================
// Providers
// ===========================================================================

#[test]
fn provider_names() {
    assert_eq!(AnthropicProvider::new("k").name(), "anthropic");
    assert_eq!(OpenAiProvider::new("k").name(), "openai");
}

#[test]
fn usage_accepts_openai_field_names() {
    let usage: Usage = serde_json::from_str(r#"{"prompt_tokens": 3, "completion_tokens": 5}"#).unwrap();
    assert_eq!(usage.input_tokens, 3);
    assert_eq!(usage.output_tokens, 5);
}

#[test]
fn error_display() {
    assert_eq!(LlmError::RateLimited { retry_after_ms: 10 }.to_string(), "rate limited: retry after 10ms");
    assert_eq!(LlmError::Cancelled.to_string(), "cancelled");
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    let provider = AnthropicProvider::new("k").with_base_url("http://127.0.0.1:9");
    let result = provider.complete_stream(LlmRequest::default(), None).await;
    assert!(matches!(result, Err(LlmError::NetworkError(_))));
}
