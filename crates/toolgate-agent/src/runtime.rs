//! Chat runtime - the agentic loop over a guarded tool gate

use crate::errors::StructuredError;
use crate::gate::ToolGate;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toolgate_core::{Dialect, LlmConfig, Parameters};
use toolgate_llm::{
    AccumulatedToolCall, AnthropicProvider, ContentBlock, LlmError, LlmMessage, LlmProvider,
    LlmRequest, OpenAiProvider, StreamDelta,
};
use toolgate_tools::Fault;
use tracing::{debug, info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a coding assistant working inside a project \
directory. Use the provided tools to inspect and change files and to run commands. Paths are \
relative to the project root.";

#[derive(Clone, Debug, PartialEq)]
pub enum AgentEvent {
    Text(String),
    Thinking(String),
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments: String },
    ToolExecuting { id: String, name: String },
    ToolResult { id: String, name: String, result: String, is_error: bool },
    Done { stop_reason: String },
    Error(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TurnSummary {
    /// Assistant text of the final model response.
    pub text: String,
    pub iterations: usize,
    pub tool_calls: usize,
    pub stop_reason: String,
}

/// Build the provider for the configured dialect.
pub fn provider_from_config(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    let api_key = config.api_key.clone().unwrap_or_default();
    match config.dialect {
        Dialect::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key);
            if !config.base_url.is_empty() {
                provider = provider.with_base_url(&config.base_url);
            }
            Arc::new(provider)
        }
        Dialect::OpenAi => {
            let mut provider = OpenAiProvider::new(api_key);
            if !config.base_url.is_empty() {
                provider = provider.with_base_url(&config.base_url);
            }
            Arc::new(provider)
        }
    }
}

pub struct ChatRuntime {
    provider: Arc<dyn LlmProvider>,
    gate: ToolGate,
    config: LlmConfig,
    system_prompt: Option<String>,
}

impl ChatRuntime {
    pub fn new(provider: Arc<dyn LlmProvider>, gate: ToolGate, config: LlmConfig) -> Self {
        Self {
            provider,
            gate,
            config,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn gate(&self) -> &ToolGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut ToolGate {
        &mut self.gate
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub async fn run_turn(
        &mut self,
        user_message: &str,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<TurnSummary, StructuredError> {
        self.run_turn_cancellable(user_message, events, CancellationToken::new())
            .await
    }

    /// Run one user turn: stream the model, execute requested tools through
    /// the gate, feed results back, repeat until the model answers in text.
    ///
    /// Cancelling `cancel` ends the turn after the current step; whatever was
    /// already appended is saved.
    pub async fn run_turn_cancellable(
        &mut self,
        user_message: &str,
        events: mpsc::Sender<AgentEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnSummary, StructuredError> {
        self.gate.push_message(LlmMessage::user(user_message));

        let mut summary = TurnSummary::default();

        loop {
            if cancel.is_cancelled() {
                summary.stop_reason = "cancelled".to_string();
                let _ = events.send(AgentEvent::Done { stop_reason: summary.stop_reason.clone() }).await;
                break;
            }

            summary.iterations += 1;
            if summary.iterations > self.config.max_tool_iterations {
                warn!("Max tool iterations ({}) exceeded", self.config.max_tool_iterations);
                summary.stop_reason = "max_iterations".to_string();
                let _ = events
                    .send(AgentEvent::Error("Max tool iterations exceeded".to_string()))
                    .await;
                break;
            }

            let request = LlmRequest {
                model: self.config.model.clone(),
                messages: self.gate.transcript().to_vec(),
                tools: Some(self.gate.tool_definitions()),
                max_tokens: Some(self.config.max_tokens),
                system: self.system_prompt.clone(),
                ..Default::default()
            };

            let stream = match self.provider.complete_stream(request, Some(cancel.clone())).await {
                Ok(s) => s,
                Err(e) => return Err(self.fail_turn(e, &events).await),
            };

            let mut text_content = String::new();
            let mut tool_calls: Vec<AccumulatedToolCall> = Vec::new();
            let mut current_tool: Option<AccumulatedToolCall> = None;
            let mut stop_reason = "end_turn".to_string();
            let mut stream_error: Option<LlmError> = None;
            let mut cancelled = false;

            tokio::pin!(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(StreamDelta::Text(text)) => {
                        text_content.push_str(&text);
                        let _ = events.send(AgentEvent::Text(text)).await;
                    }
                    Ok(StreamDelta::Thinking(thinking)) => {
                        let _ = events.send(AgentEvent::Thinking(thinking)).await;
                    }
                    Ok(StreamDelta::ToolCallStart { id, name }) => {
                        current_tool = Some(AccumulatedToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            arguments: String::new(),
                        });
                        let _ = events.send(AgentEvent::ToolCallStart { id, name }).await;
                    }
                    Ok(StreamDelta::ToolCallDelta { id, arguments }) => {
                        if let Some(ref mut tool) = current_tool {
                            tool.arguments.push_str(&arguments);
                        }
                        let _ = events.send(AgentEvent::ToolCallDelta { id, arguments }).await;
                    }
                    Ok(StreamDelta::ToolCallEnd { .. }) => {
                        if let Some(tool) = current_tool.take() {
                            tool_calls.push(tool);
                        }
                    }
                    Ok(StreamDelta::Done { stop_reason: sr, .. }) => {
                        if let Some(r) = sr {
                            stop_reason = r;
                        }
                    }
                    Ok(StreamDelta::Error(e)) => {
                        let _ = events.send(AgentEvent::Error(e)).await;
                    }
                    Err(LlmError::Cancelled) => {
                        cancelled = true;
                        break;
                    }
                    Err(e) => {
                        stream_error = Some(e);
                        break;
                    }
                }
            }
            // A tool block still open when the stream ends is incomplete; drop it.
            if let Some(tool) = current_tool.take() {
                debug!("Dropping unterminated tool call {}", tool.id);
            }

            if let Some(e) = stream_error {
                if text_content.is_empty() && tool_calls.is_empty() {
                    return Err(self.fail_turn(e, &events).await);
                }
                warn!("Stream ended early: {}", e);
                let _ = events.send(AgentEvent::Error(e.to_string())).await;
            }

            if cancelled {
                if !text_content.is_empty() {
                    self.gate.push_message(LlmMessage::assistant(&text_content));
                }
                summary.text = text_content;
                summary.stop_reason = "cancelled".to_string();
                let _ = events.send(AgentEvent::Done { stop_reason: summary.stop_reason.clone() }).await;
                break;
            }

            if tool_calls.is_empty() {
                if !text_content.is_empty() {
                    self.gate.push_message(LlmMessage::assistant(&text_content));
                }
                summary.text = text_content;
                summary.stop_reason = stop_reason.clone();
                let _ = events.send(AgentEvent::Done { stop_reason }).await;
                break;
            }

            let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
            if !text_content.is_empty() {
                blocks.push(ContentBlock::Text { text: text_content.clone() });
            }
            blocks.extend(tool_calls.iter().map(|tc| ContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.name.clone(),
                input: tc
                    .parse_arguments()
                    .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
            }));
            self.gate.push_message(LlmMessage::blocks("assistant", blocks));

            let mut results = Vec::with_capacity(tool_calls.len());
            for tc in tool_calls {
                summary.tool_calls += 1;
                let _ = events
                    .send(AgentEvent::ToolExecuting { id: tc.id.clone(), name: tc.name.clone() })
                    .await;

                let (content, is_error) = self.run_tool_call(&tc).await;
                let _ = events
                    .send(AgentEvent::ToolResult {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        result: content.clone(),
                        is_error,
                    })
                    .await;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: tc.id,
                    content,
                    is_error: is_error.then_some(true),
                });
            }
            self.gate.push_message(LlmMessage::blocks("user", results));

            debug!("Tool calls executed, continuing loop (iteration {})", summary.iterations);
        }

        self.gate.save_transcript();
        info!(
            "Turn complete: session={}, messages={}, tool_calls={}",
            self.gate.session(),
            self.gate.transcript().len(),
            summary.tool_calls
        );
        Ok(summary)
    }

    /// Execute one requested tool call. Returns the result text and error flag.
    async fn run_tool_call(&mut self, tc: &AccumulatedToolCall) -> (String, bool) {
        let parameters: Parameters = match tc.parse_arguments() {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(other) => {
                return (format!("Error: tool arguments must be a JSON object, got {}", other), true);
            }
            Err(e) => {
                let error = self.gate.errors().graceful_error(&Fault::from(e));
                return (format!("Error: invalid tool arguments: {}", error.message), true);
            }
        };

        let outcome = self.gate.execute_tool(&tc.name, parameters).await;
        if outcome.needs_pattern_reset() {
            warn!("Pattern reset after blocked call to {}", tc.name);
            self.gate.reset_patterns();
        }
        match &outcome.error_info {
            Some(error) if !outcome.is_success() => {
                let hint = self.gate.errors().recovery_hint(error);
                (format!("Error: {}\nSuggestion: {}", outcome.result.trim_start_matches("Error: "), hint), true)
            }
            _ => {
                let is_error = !outcome.is_success();
                (outcome.result, is_error)
            }
        }
    }

    /// Undo the user message for a turn the provider never answered.
    async fn fail_turn(&mut self, error: LlmError, events: &mpsc::Sender<AgentEvent>) -> StructuredError {
        let dangling = self
            .gate
            .transcript()
            .last()
            .is_some_and(|m| m.role == "user" && !m.has_tool_result());
        if dangling {
            self.gate.pop_message();
        }
        self.gate.save_transcript();
        let structured = self.gate.handle_llm_error(error);
        warn!("LLM request failed: {}", structured);
        let _ = events.send(AgentEvent::Error(structured.message.clone())).await;
        structured
    }
}
