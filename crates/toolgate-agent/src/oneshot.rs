//! One-shot prompts without tools: `ask` with context files, and `analyze`
//!
//! Files are read through the same validator and `read_file` tool the model
//! uses, so they stay pinned to the project root.

use crate::errors::{ErrorDetail, GracefulErrorHandler, StructuredError};
use futures::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use toolgate_core::{LlmConfig, Parameters};
use toolgate_llm::{LlmMessage, LlmProvider, LlmRequest, StreamDelta};
use toolgate_tools::tools::read_file::ReadFileTool;
use toolgate_tools::{Fault, FaultKind, ParameterValidator, Tool, ToolResult};
use tracing::{debug, warn};

pub const ONE_SHOT_SYSTEM_PROMPT: &str = "You are a coding assistant. Answer from the files \
provided as context and say so when they do not contain the answer.";

pub const DEFAULT_ANALYSIS_QUESTION: &str = "Analyze this code and suggest improvements";

const ONE_SHOT_TEMPERATURE: f32 = 0.7;

/// Prompt sent by `analyze`.
pub fn analysis_prompt(file_path: &str, code: &str, question: &str) -> String {
    format!(
        "Analyze this code file:\n\nFILE: {}\n\nCODE:\n```\n{}\n```\n\nQUESTION: {}\n\n\
         Please provide:\n\
         1. What the implementation does\n\
         2. Potential improvements or optimizations\n\
         3. Testable predictions or next steps\n",
        file_path, code, question
    )
}

pub struct OneShot {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
    reader: ReadFileTool,
    validator: ParameterValidator,
    errors: GracefulErrorHandler,
    system_prompt: String,
}

impl OneShot {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig, project_root: impl AsRef<Path>) -> Self {
        Self {
            provider,
            config,
            reader: ReadFileTool::new(project_root),
            validator: ParameterValidator::new(),
            errors: GracefulErrorHandler::new(),
            system_prompt: ONE_SHOT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Ask a question with the given project files appended to the system
    /// prompt. Files that do not exist are skipped; unsafe paths are errors.
    pub async fn ask(&self, prompt: &str, context_files: &[String]) -> Result<String, StructuredError> {
        let mut system = self.system_prompt.clone();
        for file_path in context_files {
            match self.load_file(file_path).await {
                Ok(content) => {
                    system.push_str(&format!("\n\n## File: {}\n{}", file_path, content));
                }
                Err(e) if is_not_found(&e) => warn!("Skipping missing context file {}", file_path),
                Err(e) => return Err(e),
            }
        }
        self.complete(system, prompt).await
    }

    /// Send one file for review, with an optional specific question.
    pub async fn analyze(&self, file_path: &str, question: Option<&str>) -> Result<String, StructuredError> {
        let code = self.load_file(file_path).await?;
        let prompt = analysis_prompt(file_path, &code, question.unwrap_or(DEFAULT_ANALYSIS_QUESTION));
        self.complete(self.system_prompt.clone(), &prompt).await
    }

    pub async fn load_file(&self, file_path: &str) -> Result<String, StructuredError> {
        let mut params = Parameters::new();
        params.insert("file_path".to_string(), Value::String(file_path.to_string()));
        if let Err(e) = self.validator.validate("read_file", &params) {
            return Err(self.errors.parameter_error("read_file", &e.to_string()));
        }

        match self.reader.execute(params).await {
            ToolResult::Text(content) => Ok(content),
            failed => {
                let fault = failed
                    .fault()
                    .unwrap_or_else(|| Fault::new(FaultKind::Other, format!("Failed to read {}", file_path)));
                Err(self.errors.graceful_error(&fault))
            }
        }
    }

    async fn complete(&self, system: String, prompt: &str) -> Result<String, StructuredError> {
        let request = LlmRequest {
            model: self.config.model.clone(),
            messages: vec![LlmMessage::user(prompt)],
            tools: None,
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(ONE_SHOT_TEMPERATURE),
            system: Some(system),
        };
        debug!("one-shot request: model={} prompt_chars={}", request.model, prompt.len());

        let stream = self
            .provider
            .complete_stream(request, None)
            .await
            .map_err(|e| self.errors.graceful_error(&Fault::from(e)))?;
        tokio::pin!(stream);

        let mut text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamDelta::Text(t)) => text.push_str(&t),
                Ok(StreamDelta::Error(e)) => warn!("one-shot stream error: {}", e),
                Ok(_) => {}
                Err(e) if text.is_empty() => return Err(self.errors.graceful_error(&Fault::from(e))),
                Err(e) => {
                    warn!("one-shot stream ended early: {}", e);
                    break;
                }
            }
        }
        Ok(text)
    }
}

fn is_not_found(error: &StructuredError) -> bool {
    matches!(error.detail, ErrorDetail::ExecutionError { exception_type: FaultKind::NotFound })
}
