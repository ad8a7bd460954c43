//! OpenAI Chat Completions dialect provider (DeepSeek's default endpoint)
//!
//! Conversation state is kept in Anthropic-style blocks; this module converts
//! it to chat messages on the way out (`tool_use` → `tool_calls`,
//! `tool_result` → `tool` role) and folds chunked `tool_calls` deltas back
//! into start/delta/end events on the way in.

use crate::provider::{status_error, with_cancel, LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{ContentBlock, LlmContent, LlmMessage, LlmRequest, LlmTool, StreamDelta, Usage};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEEPSEEK_OPENAI_BASE_URL: &str = "https://api.deepseek.com";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEEPSEEK_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str { "openai" }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let body = build_body(&request);
        debug!("OpenAI request: model={} messages={}", request.model, body["messages"].as_array().map_or(0, |m| m.len()));

        let response = self.client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("openai", status, error_text));
        }

        let events = response.bytes_stream().eventsource();
        let stream = async_stream::stream! {
            tokio::pin!(events);
            let mut state = ChunkState::default();
            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(LlmError::StreamError(e.to_string()));
                        break;
                    }
                };
                for item in parse_chunk(&event.data, &mut state) {
                    yield item;
                }
            }
            for item in state.finish(None, None) {
                yield Ok(item);
            }
        };

        Ok(with_cancel(Box::pin(stream), cancel))
    }
}

/// Build the chat completions request body.
pub(crate) fn build_body(request: &LlmRequest) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    for message in &request.messages {
        messages.extend(convert_message(message));
    }

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
    });
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(tools) = &request.tools {
        body["tools"] = Value::Array(tools.iter().map(convert_tool).collect());
    }
    body
}

fn convert_tool(tool: &LlmTool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

fn convert_message(message: &LlmMessage) -> Vec<Value> {
    let blocks = match &message.content {
        LlmContent::Text(text) => return vec![json!({"role": message.role, "content": text})],
        LlmContent::Blocks(blocks) => blocks,
    };

    let text = message.text();
    let mut out = Vec::new();

    if message.role == "assistant" {
        let tool_calls: Vec<Value> = blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": input.to_string()},
                })),
                _ => None,
            })
            .collect();
        let mut msg = json!({
            "role": "assistant",
            "content": if text.is_empty() { Value::Null } else { json!(text) },
        });
        if !tool_calls.is_empty() {
            msg["tool_calls"] = Value::Array(tool_calls);
        }
        out.push(msg);
        return out;
    }

    for block in blocks {
        if let ContentBlock::ToolResult { tool_use_id, content, .. } = block {
            out.push(json!({"role": "tool", "tool_call_id": tool_use_id, "content": content}));
        }
    }
    if !text.is_empty() {
        out.push(json!({"role": message.role, "content": text}));
    }
    out
}

/// Streaming state: the tool call currently being assembled, by choice index.
#[derive(Default)]
pub(crate) struct ChunkState {
    current: Option<(usize, String)>,
    done: bool,
}

impl ChunkState {
    fn finish(&mut self, stop_reason: Option<String>, usage: Option<Usage>) -> Vec<StreamDelta> {
        let mut out = Vec::new();
        if let Some((_, id)) = self.current.take() {
            out.push(StreamDelta::ToolCallEnd { id });
        }
        if !self.done {
            self.done = true;
            out.push(StreamDelta::Done { stop_reason, usage });
        }
        out
    }
}

/// Translate one `data:` payload into deltas.
pub(crate) fn parse_chunk(data: &str, state: &mut ChunkState) -> Vec<LlmResult<StreamDelta>> {
    let data = data.trim();
    if data == "[DONE]" {
        return state.finish(None, None).into_iter().map(Ok).collect();
    }

    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => return vec![Err(LlmError::InvalidResponse(format!("bad chunk: {}", e)))],
    };

    let mut out = Vec::new();
    for choice in chunk.choices {
        if let Some(reasoning) = choice.delta.reasoning_content.filter(|s| !s.is_empty()) {
            out.push(Ok(StreamDelta::Thinking(reasoning)));
        }
        if let Some(text) = choice.delta.content.filter(|s| !s.is_empty()) {
            out.push(Ok(StreamDelta::Text(text)));
        }
        for call in choice.delta.tool_calls {
            let function = call.function.unwrap_or_default();
            let starts_new = match (&state.current, &call.id) {
                (None, _) => true,
                (Some((index, _)), _) if *index != call.index => true,
                (Some((_, open)), Some(id)) => open != id,
                (Some(_), None) => false,
            };
            if starts_new {
                if let Some((_, id)) = state.current.take() {
                    out.push(Ok(StreamDelta::ToolCallEnd { id }));
                }
                let id = call.id.clone().unwrap_or_else(|| format!("call_{}", call.index));
                state.current = Some((call.index, id.clone()));
                out.push(Ok(StreamDelta::ToolCallStart {
                    id,
                    name: function.name.clone().unwrap_or_default(),
                }));
            }
            if let (Some((_, id)), Some(arguments)) = (&state.current, function.arguments) {
                if !arguments.is_empty() {
                    out.push(Ok(StreamDelta::ToolCallDelta { id: id.clone(), arguments }));
                }
            }
        }
        if let Some(reason) = choice.finish_reason {
            out.extend(state.finish(Some(reason), chunk.usage.clone()).into_iter().map(Ok));
        }
    }
    out
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallChunk>,
}

#[derive(Deserialize)]
struct ToolCallChunk {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionChunk>,
}

#[derive(Deserialize, Default, Clone)]
struct FunctionChunk {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(items: Vec<LlmResult<StreamDelta>>) -> Vec<StreamDelta> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn text_chunks() {
        let mut state = ChunkState::default();
        let out = ok(parse_chunk(r#"{"choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#, &mut state));
        assert_eq!(out, vec![StreamDelta::Text("Hi".into())]);
    }

    #[test]
    fn chunked_tool_call_is_reassembled() {
        let mut state = ChunkState::default();
        let mut out = ok(parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"read_file","arguments":""}}]}}]}"#,
            &mut state,
        ));
        out.extend(ok(parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"file_path\":\"a.txt\"}"}}]}}]}"#,
            &mut state,
        )));
        out.extend(ok(parse_chunk(
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            &mut state,
        )));
        out.extend(ok(parse_chunk("[DONE]", &mut state)));

        assert_eq!(out, vec![
            StreamDelta::ToolCallStart { id: "call_a".into(), name: "read_file".into() },
            StreamDelta::ToolCallDelta { id: "call_a".into(), arguments: r#"{"file_path":"a.txt"}"#.into() },
            StreamDelta::ToolCallEnd { id: "call_a".into() },
            StreamDelta::Done { stop_reason: Some("tool_calls".into()), usage: None },
        ]);
    }

    #[test]
    fn second_tool_index_closes_first() {
        let mut state = ChunkState::default();
        let out = ok(parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[
                {"index":0,"id":"c0","function":{"name":"git_status","arguments":"{}"}},
                {"index":1,"id":"c1","function":{"name":"list_files","arguments":"{}"}}
            ]}}]}"#,
            &mut state,
        ));
        assert_eq!(out[2], StreamDelta::ToolCallEnd { id: "c0".into() });
        assert_eq!(out[3], StreamDelta::ToolCallStart { id: "c1".into(), name: "list_files".into() });
    }

    #[test]
    fn bad_chunk_is_invalid_response() {
        let mut state = ChunkState::default();
        let out = parse_chunk("{not json", &mut state);
        assert!(matches!(out[0], Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn body_converts_blocks_to_chat_messages() {
        let request = LlmRequest {
            system: Some("be careful".into()),
            messages: vec![
                LlmMessage::user("list files"),
                LlmMessage::blocks("assistant", vec![
                    ContentBlock::Text { text: "Looking.".into() },
                    ContentBlock::ToolUse { id: "c1".into(), name: "list_files".into(), input: json!({}) },
                ]),
                LlmMessage::blocks("user", vec![ContentBlock::ToolResult {
                    tool_use_id: "c1".into(),
                    content: "FILE: a.txt".into(),
                    is_error: None,
                }]),
            ],
            tools: Some(vec![LlmTool {
                name: "list_files".into(),
                description: "List files".into(),
                input_schema: json!({"type": "object", "properties": {}}),
            }]),
            ..Default::default()
        };
        let body = build_body(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "list_files");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "c1");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["stream"], true);
    }
}
