//! Graceful error handler
//!
//! Turns validation rejections, pattern rejections and runtime faults into
//! `StructuredError`s with a severity and a recoverability flag. It suggests
//! recovery, it never performs it.

use serde::Serialize;
use toolgate_tools::{Fault, FaultKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetail {
    ParameterError { tool_name: String, suggestion: String },
    PatternReset { action: String },
    ExecutionError { exception_type: FaultKind },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructuredError {
    pub error_id: String,
    pub message: String,
    pub severity: Severity,
    pub recoverable: bool,
    #[serde(flatten)]
    pub detail: ErrorDetail,
}

impl StructuredError {
    pub fn type_name(&self) -> &'static str {
        match self.detail {
            ErrorDetail::ParameterError { .. } => "parameter_error",
            ErrorDetail::PatternReset { .. } => "pattern_reset",
            ErrorDetail::ExecutionError { .. } => "execution_error",
        }
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.type_name(), self.message)
    }
}

/// `<prefix>_<tool>_<unix secs>_<8 hex>`; the random tail keeps ids unique
/// within one second.
fn error_id(prefix: &str, name: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}_{}", prefix, name, chrono::Utc::now().timestamp(), &suffix[..8])
}

fn suggestion_for(tool_name: &str, message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("missing") {
        format!("Provide the missing required parameter for {}", tool_name)
    } else if lower.contains("type") || lower.contains("must be a") {
        format!("Check parameter types for {} against its schema", tool_name)
    } else if lower.contains("dangerous") {
        format!("Remove dangerous operations from the {} command", tool_name)
    } else {
        format!("Review the parameters for {} and try again", tool_name)
    }
}

/// Severity table for runtime faults.
pub fn classify(kind: FaultKind) -> Severity {
    match kind {
        FaultKind::Connection | FaultKind::Timeout | FaultKind::Auth => Severity::Critical,
        FaultKind::InvalidValue | FaultKind::Type | FaultKind::Key => Severity::High,
        FaultKind::NotFound | FaultKind::PermissionDenied => Severity::Medium,
        FaultKind::Interrupted | FaultKind::Exit | FaultKind::Other => Severity::Low,
    }
}

pub fn is_recoverable(kind: FaultKind) -> bool {
    !matches!(kind, FaultKind::Interrupted | FaultKind::Exit)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GracefulErrorHandler;

impl GracefulErrorHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn parameter_error(&self, tool_name: &str, message: &str) -> StructuredError {
        StructuredError {
            error_id: error_id("param", tool_name),
            message: message.to_string(),
            severity: Severity::High,
            recoverable: true,
            detail: ErrorDetail::ParameterError {
                tool_name: tool_name.to_string(),
                suggestion: suggestion_for(tool_name, message),
            },
        }
    }

    pub fn pattern_reset(&self, reason: &str) -> StructuredError {
        StructuredError {
            error_id: error_id("pattern", "reset"),
            message: format!("Invalid execution pattern: {}", reason),
            severity: Severity::Critical,
            recoverable: true,
            detail: ErrorDetail::PatternReset { action: "reset_patterns".to_string() },
        }
    }

    pub fn graceful_error(&self, fault: &Fault) -> StructuredError {
        StructuredError {
            error_id: error_id("exec", fault.kind.name()),
            message: fault.message.clone(),
            severity: classify(fault.kind),
            recoverable: is_recoverable(fault.kind),
            detail: ErrorDetail::ExecutionError { exception_type: fault.kind },
        }
    }

    pub fn recovery_hint(&self, error: &StructuredError) -> String {
        match &error.detail {
            ErrorDetail::ParameterError { suggestion, .. } => suggestion.clone(),
            ErrorDetail::PatternReset { .. } => {
                "Reset execution patterns and consider clearing the session context".to_string()
            }
            ErrorDetail::ExecutionError { .. } if !error.recoverable => {
                "Not recoverable; stop and restart the session".to_string()
            }
            ErrorDetail::ExecutionError { exception_type } => match classify(*exception_type) {
                Severity::Critical => "Check connectivity and credentials, then retry".to_string(),
                Severity::High => "Correct the input values and retry".to_string(),
                Severity::Medium => "Check that the path exists and is accessible".to_string(),
                Severity::Low => "Retry the operation".to_string(),
            },
        }
    }
}
