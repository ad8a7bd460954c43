//! Typed runtime failures.
//!
//! A `Fault` is what a tool, the process environment, or the LLM client
//! produced when something went wrong at run time. The error handler grades
//! it by `kind`.

use serde::Serialize;
use toolgate_llm::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Connection,
    Timeout,
    Auth,
    InvalidValue,
    Type,
    Key,
    NotFound,
    PermissionDenied,
    /// Interrupted from outside (cancelled task, signal).
    Interrupted,
    /// The process was asked to exit.
    Exit,
    Other,
}

impl FaultKind {
    pub fn name(&self) -> &'static str {
        match self {
            FaultKind::Connection => "connection",
            FaultKind::Timeout => "timeout",
            FaultKind::Auth => "auth",
            FaultKind::InvalidValue => "invalid_value",
            FaultKind::Type => "type",
            FaultKind::Key => "key",
            FaultKind::NotFound => "not_found",
            FaultKind::PermissionDenied => "permission_denied",
            FaultKind::Interrupted => "interrupted",
            FaultKind::Exit => "exit",
            FaultKind::Other => "other",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Wrap an I/O error, keeping its kind and prefixing `context`.
    pub fn io(context: &str, err: std::io::Error) -> Self {
        let kind = io_kind(&err);
        Self::new(kind, format!("{}: {}", context, err))
    }
}

fn io_kind(err: &std::io::Error) -> FaultKind {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => FaultKind::NotFound,
        ErrorKind::PermissionDenied => FaultKind::PermissionDenied,
        ErrorKind::TimedOut => FaultKind::Timeout,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::BrokenPipe => FaultKind::Connection,
        ErrorKind::InvalidInput | ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
            FaultKind::InvalidValue
        }
        ErrorKind::Interrupted => FaultKind::Interrupted,
        _ => FaultKind::Other,
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Self::new(io_kind(&err), err.to_string())
    }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        let kind = match err.classify() {
            Category::Data => FaultKind::Type,
            Category::Syntax | Category::Eof => FaultKind::InvalidValue,
            Category::Io => FaultKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<LlmError> for Fault {
    fn from(err: LlmError) -> Self {
        let kind = match &err {
            LlmError::AuthFailed(_) => FaultKind::Auth,
            LlmError::NetworkError(e) if e.is_timeout() => FaultKind::Timeout,
            LlmError::NetworkError(_)
            | LlmError::RequestFailed(_)
            | LlmError::RateLimited { .. }
            | LlmError::StreamError(_) => FaultKind::Connection,
            LlmError::InvalidResponse(_) => FaultKind::InvalidValue,
            LlmError::Cancelled => FaultKind::Interrupted,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<tokio::task::JoinError> for Fault {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            return Self::new(FaultKind::Interrupted, "tool task was cancelled");
        }
        let detail = match err.try_into_panic() {
            Ok(payload) => payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string()),
            Err(e) => e.to_string(),
        };
        Self::new(FaultKind::Other, format!("tool panicked: {}", detail))
    }
}
