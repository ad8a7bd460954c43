//! Anthropic Messages dialect provider with SSE streaming (DeepSeek `/anthropic` endpoint)

use crate::provider::{status_error, with_cancel, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmContent, LlmRequest, StreamDelta, Usage};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEEPSEEK_ANTHROPIC_BASE_URL: &str = "https://api.deepseek.com/anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEEPSEEK_ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str { "anthropic" }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let body = AnthropicRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(|m| AnthropicMessage {
                role: m.role.clone(),
                content: match &m.content {
                    LlmContent::Text(s) => serde_json::json!(s),
                    LlmContent::Blocks(blocks) => serde_json::to_value(blocks).unwrap_or_default(),
                },
            }).collect(),
            max_tokens: request.max_tokens.unwrap_or(4096),
            stream: true,
            system: request.system.clone(),
            temperature: request.temperature,
            tools: request.tools.as_ref().map(|tools| {
                tools.iter().map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                }).collect()
            }),
        };

        debug!("Anthropic request: model={} messages={}", body.model, body.messages.len());

        let response = self.client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, error_text));
        }

        let stream = parse_sse_stream(response.bytes_stream());
        Ok(with_cancel(Box::pin(stream), cancel))
    }
}

fn parse_sse_stream<E>(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send
where
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let events = bytes_stream.eventsource();
        tokio::pin!(events);
        let mut current_tool_id: Option<String> = None;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    break;
                }
            };
            if event.data.is_empty() { continue; }

            if let Some(item) = parse_event(&event.event, &event.data, &mut current_tool_id) {
                yield item;
            }
        }
    }
}

/// Translate one SSE event into a delta. `current_tool_id` tracks the open
/// tool_use block so argument fragments can be attributed to it.
pub(crate) fn parse_event(
    event_type: &str,
    event_data: &str,
    current_tool_id: &mut Option<String>,
) -> Option<LlmResult<StreamDelta>> {
    match event_type {
        "content_block_start" => {
            let data = serde_json::from_str::<ContentBlockStart>(event_data).ok()?;
            match data.content_block {
                ContentBlockType::ToolUse { id, name } => {
                    *current_tool_id = Some(id.clone());
                    Some(Ok(StreamDelta::ToolCallStart { id, name }))
                }
                ContentBlockType::Text { .. } | ContentBlockType::Thinking { .. } => None,
            }
        }
        "content_block_delta" => {
            let data = serde_json::from_str::<ContentBlockDelta>(event_data).ok()?;
            match data.delta {
                DeltaType::TextDelta { text } => Some(Ok(StreamDelta::Text(text))),
                DeltaType::ThinkingDelta { thinking } => Some(Ok(StreamDelta::Thinking(thinking))),
                DeltaType::InputJsonDelta { partial_json } => {
                    let id = current_tool_id.clone()?;
                    Some(Ok(StreamDelta::ToolCallDelta { id, arguments: partial_json }))
                }
                DeltaType::SignatureDelta { .. } => None,
            }
        }
        "content_block_stop" => {
            current_tool_id.take().map(|id| Ok(StreamDelta::ToolCallEnd { id }))
        }
        "message_delta" => {
            let data = serde_json::from_str::<MessageDelta>(event_data).ok()?;
            if let Some(stop_reason) = &data.delta.stop_reason {
                debug!("Message complete: stop_reason={}", stop_reason);
            }
            Some(Ok(StreamDelta::Done {
                stop_reason: data.delta.stop_reason,
                usage: data.usage,
            }))
        }
        "error" => {
            let data = serde_json::from_str::<ErrorEvent>(event_data).ok()?;
            Some(Err(LlmError::StreamError(data.error.message)))
        }
        _ => None,
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    content_block: ContentBlockType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlockType {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(rename = "text")]
    #[allow(dead_code)]
    Text { text: String },
    #[serde(rename = "thinking")]
    #[allow(dead_code)]
    Thinking { thinking: String },
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(rename = "signature_delta")]
    #[allow(dead_code)]
    SignatureDelta { signature: String },
}

#[derive(Deserialize)]
struct MessageDelta {
    delta: MessageDeltaContent,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct MessageDeltaContent {
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_block_sequence() {
        let mut current = None;
        let start = parse_event(
            "content_block_start",
            r#"{"index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"read_file","input":{}}}"#,
            &mut current,
        );
        assert!(matches!(start, Some(Ok(StreamDelta::ToolCallStart { ref id, ref name })) if id == "toolu_1" && name == "read_file"));

        let delta = parse_event(
            "content_block_delta",
            r#"{"index":1,"delta":{"type":"input_json_delta","partial_json":"{\"file_path\":"}}"#,
            &mut current,
        );
        assert!(matches!(delta, Some(Ok(StreamDelta::ToolCallDelta { ref id, .. })) if id == "toolu_1"));

        let stop = parse_event("content_block_stop", r#"{"index":1}"#, &mut current);
        assert!(matches!(stop, Some(Ok(StreamDelta::ToolCallEnd { ref id })) if id == "toolu_1"));
        assert!(current.is_none());
    }

    #[test]
    fn text_delta_and_stop_of_text_block() {
        let mut current = None;
        let text = parse_event(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"text_delta","text":"Hello"}}"#,
            &mut current,
        );
        assert!(matches!(text, Some(Ok(StreamDelta::Text(ref t))) if t == "Hello"));
        assert!(parse_event("content_block_stop", r#"{"index":0}"#, &mut current).is_none());
    }

    #[test]
    fn message_delta_carries_stop_reason() {
        let mut current = None;
        let done = parse_event(
            "message_delta",
            r#"{"delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":12}}"#,
            &mut current,
        );
        match done {
            Some(Ok(StreamDelta::Done { stop_reason, usage })) => {
                assert_eq!(stop_reason.as_deref(), Some("tool_use"));
                assert_eq!(usage.unwrap().output_tokens, 12);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn error_event_becomes_error() {
        let mut current = None;
        let err = parse_event(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            &mut current,
        );
        assert!(matches!(err, Some(Err(LlmError::StreamError(ref m))) if m == "Overloaded"));
    }

    fn collect_texts(chunks: Vec<Vec<u8>>) -> Vec<String> {
        let source = futures::stream::iter(
            chunks.into_iter().map(|c| Ok::<_, std::io::Error>(bytes::Bytes::from(c))),
        );
        let deltas: Vec<_> = futures::executor::block_on(parse_sse_stream(source).collect());
        deltas
            .into_iter()
            .filter_map(|d| match d {
                Ok(StreamDelta::Text(t)) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn multibyte_text_split_across_chunks() {
        let event = "event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"你好\"}}\n\n";
        let bytes = event.as_bytes();
        let split = event.find('你').unwrap() + 1;
        let texts = collect_texts(vec![bytes[..split].to_vec(), bytes[split..].to_vec()]);
        assert_eq!(texts, vec!["你好".to_string()]);
    }

    #[test]
    fn crlf_delimited_events() {
        let texts = collect_texts(vec![
            b"event: content_block_delta\r\ndata: {\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"hi\"}}\r\n\r\n".to_vec(),
        ]);
        assert_eq!(texts, vec!["hi".to_string()]);
    }

    #[test]
    fn tool_call_arguments_across_events() {
        let source = futures::stream::iter(vec![Ok::<_, std::io::Error>(bytes::Bytes::from_static(
            b"event: content_block_start\ndata: {\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"t1\",\"name\":\"write_file\"}}\n\n\
event: content_block_delta\ndata: {\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{}\"}}\n\n\
event: content_block_stop\ndata: {\"index\":0}\n\n",
        ))]);
        let deltas: Vec<_> = futures::executor::block_on(parse_sse_stream(source).collect());
        let deltas: Vec<StreamDelta> = deltas.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(deltas, vec![
            StreamDelta::ToolCallStart { id: "t1".into(), name: "write_file".into() },
            StreamDelta::ToolCallDelta { id: "t1".into(), arguments: "{}".into() },
            StreamDelta::ToolCallEnd { id: "t1".into() },
        ]);
    }

    #[test]
    fn endpoint_joins_base_url() {
        let p = AnthropicProvider::new("k").with_base_url("http://localhost:9000/");
        assert_eq!(p.endpoint(), "http://localhost:9000/v1/messages");
    }
}
