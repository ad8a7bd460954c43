//! ToolGate - the guarded entry point for tool calls
//!
//! validate → pattern check → dispatch → record → wrap errors. Every path
//! returns a `ToolOutcome`; nothing here propagates an error or panics out.

use crate::errors::{ErrorDetail, GracefulErrorHandler, StructuredError};
use crate::monitor::{CallOutcome, ExecutionMonitor, PatternStatus};
use crate::session::SessionManager;
use crate::transcript;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use toolgate_core::{GateConfig, Parameters, Result, SessionKey};
use toolgate_llm::{LlmMessage, LlmTool};
use toolgate_tools::{create_default_registry, Fault, ParameterValidator, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub status: OutcomeStatus,
    pub tool_name: String,
    pub result: String,
    #[serde(serialize_with = "as_secs_f64")]
    pub execution_time: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_info: Option<StructuredError>,
}

fn as_secs_f64<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// True when the monitor refused the call and wants a reset.
    pub fn needs_pattern_reset(&self) -> bool {
        matches!(
            self.error_info,
            Some(StructuredError { detail: ErrorDetail::PatternReset { .. }, .. })
        )
    }

    fn failed(tool_name: &str, result: String, elapsed: Duration, error: StructuredError) -> Self {
        Self {
            status: OutcomeStatus::Error,
            tool_name: tool_name.to_string(),
            result,
            execution_time: elapsed,
            error_info: Some(error),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemStatus {
    pub session: String,
    pub message_count: usize,
    pub context_dir: PathBuf,
    pub tools: Vec<&'static str>,
    pub patterns: PatternStatus,
}

pub struct ToolGate {
    validator: ParameterValidator,
    monitor: ExecutionMonitor,
    errors: GracefulErrorHandler,
    registry: Arc<ToolRegistry>,
    sessions: SessionManager,
    session: SessionKey,
    transcript: Vec<LlmMessage>,
}

impl ToolGate {
    /// Open `session` with the builtin tools rooted at `config.tools.project_root`.
    pub fn open(config: &GateConfig, session: SessionKey) -> Result<Self> {
        Self::with_registry(config, create_default_registry(&config.tools), session)
    }

    pub fn with_registry(config: &GateConfig, registry: ToolRegistry, session: SessionKey) -> Result<Self> {
        let mut sessions = SessionManager::new(config.context_dir())?;
        let transcript = sessions.read_transcript(&session);
        if sessions.get(&session).is_none() {
            sessions.create_session(&session, None);
        }
        info!("Session {} opened with {} messages", session, transcript.len());
        Ok(Self {
            validator: ParameterValidator::new(),
            monitor: ExecutionMonitor::new(config.patterns.clone()),
            errors: GracefulErrorHandler::new(),
            registry: Arc::new(registry),
            sessions,
            session,
            transcript,
        })
    }

    pub async fn execute_tool(&mut self, tool_name: &str, parameters: Parameters) -> ToolOutcome {
        let start = Instant::now();

        let kind = match self.validator.validate(tool_name, &parameters) {
            Ok(kind) => kind,
            Err(e) => {
                let message = e.to_string();
                debug!("rejected {}: {}", tool_name, message);
                self.monitor
                    .record_call(tool_name, &parameters, CallOutcome::failure(&message));
                let error = self.errors.parameter_error(tool_name, &message);
                return ToolOutcome::failed(tool_name, message, start.elapsed(), error);
            }
        };

        let verdict = self.monitor.detect_invalid_pattern();
        if verdict.invalid {
            warn!("Blocked {}: {}", tool_name, verdict.reason);
            self.monitor
                .record_call(tool_name, &parameters, CallOutcome::failure(&verdict.reason));
            let error = self.errors.pattern_reset(&verdict.reason);
            return ToolOutcome::failed(tool_name, error.message.clone(), start.elapsed(), error);
        }

        let name = kind.as_str();
        let registry = Arc::clone(&self.registry);
        let params = parameters.clone();
        let result = match tokio::spawn(async move { registry.execute(name, params).await }).await {
            Ok(result) => result,
            Err(e) => ToolResult::Failed(Fault::from(e)),
        };
        let elapsed = start.elapsed();

        match result.fault() {
            None => {
                self.monitor
                    .record_call(name, &parameters, CallOutcome::success(elapsed));
                debug!("{} ok in {:?}", name, elapsed);
                ToolOutcome {
                    status: OutcomeStatus::Success,
                    tool_name: name.to_string(),
                    result: result.to_content_string(),
                    execution_time: elapsed,
                    error_info: None,
                }
            }
            Some(fault) => {
                self.monitor
                    .record_call(name, &parameters, CallOutcome::failed_after(&fault.message, elapsed));
                let error = self.errors.graceful_error(&fault);
                debug!("{} failed ({}): {}", name, fault.kind, fault.message);
                ToolOutcome::failed(name, result.to_content_string(), elapsed, error)
            }
        }
    }

    pub fn reset_patterns(&mut self) {
        self.monitor.reset_patterns();
    }

    /// Clear the persisted context, reset patterns, start a fresh transcript
    /// and metadata record. Returns whether the on-disk clear succeeded.
    pub fn session_restart(&mut self) -> bool {
        let cleared = self.sessions.clear_context(&self.session);
        self.monitor.reset_patterns();
        self.transcript.clear();
        self.sessions.create_session(&self.session, None);
        info!("Session {} restarted", self.session);
        cleared
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            session: self.session.to_string(),
            message_count: self.transcript.len(),
            context_dir: self.sessions.context_dir().to_path_buf(),
            tools: self.registry.list(),
            patterns: self.monitor.get_pattern_status(),
        }
    }

    pub fn handle_llm_error(&self, error: toolgate_llm::LlmError) -> StructuredError {
        self.errors.graceful_error(&Fault::from(error))
    }

    pub fn errors(&self) -> &GracefulErrorHandler {
        &self.errors
    }

    pub fn monitor(&self) -> &ExecutionMonitor {
        &self.monitor
    }

    pub fn validator(&self) -> &ParameterValidator {
        &self.validator
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    pub fn tool_definitions(&self) -> Vec<LlmTool> {
        self.registry.get_definitions()
    }

    pub fn transcript(&self) -> &[LlmMessage] {
        &self.transcript
    }

    pub fn push_message(&mut self, message: LlmMessage) {
        self.transcript.push(message);
    }

    pub fn pop_message(&mut self) -> Option<LlmMessage> {
        self.transcript.pop()
    }

    /// Persist the transcript and refresh the session record.
    pub fn save_transcript(&mut self) -> bool {
        let saved = transcript::save(&self.sessions.transcript_path(&self.session), &self.transcript);
        self.sessions.touch(&self.session, self.transcript.len());
        saved
    }
}
