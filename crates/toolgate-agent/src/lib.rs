//! toolgate agent - guarded tool execution, pattern monitoring, sessions, and the chat loop

pub mod errors;
pub mod gate;
pub mod monitor;
pub mod oneshot;
pub mod runtime;
pub mod session;
pub mod transcript;

pub use errors::{ErrorDetail, GracefulErrorHandler, Severity, StructuredError};
pub use gate::{OutcomeStatus, SystemStatus, ToolGate, ToolOutcome};
pub use monitor::{
    CallOutcome, ExecutionMetrics, ExecutionMonitor, ExecutionPattern, PatternStatus, PatternVerdict,
    ToolCallRecord,
};
pub use oneshot::{analysis_prompt, OneShot};
pub use runtime::{provider_from_config, AgentEvent, ChatRuntime, TurnSummary};
pub use session::{SessionManager, SessionRecord, TranscriptSummary};
