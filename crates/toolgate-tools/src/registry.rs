//! Tool registry and trait definitions
//!
//! Each tool is a self-contained module under tools/ implementing `Tool`.
//! The registry is keyed by `ToolKind`, so only the builtin set can ever be
//! dispatched.

use crate::fault::Fault;
use crate::schema::schema_for;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use toolgate_core::{Parameters, ToolKind};
use toolgate_llm::LlmTool;

#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Text(String),
    Failed(Fault),
    TimedOut { after: Duration },
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn failed(fault: impl Into<Fault>) -> Self {
        Self::Failed(fault.into())
    }

    /// String form handed back to the model.
    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Failed(fault) => format!("Error: {}", fault.message),
            Self::TimedOut { after } => {
                format!("Error: Command timed out after {} seconds", after.as_secs())
            }
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Text(_))
    }

    /// The fault behind a failed result. Timeouts map to a timeout fault.
    pub fn fault(&self) -> Option<Fault> {
        match self {
            Self::Text(_) => None,
            Self::Failed(fault) => Some(fault.clone()),
            Self::TimedOut { after } => Some(Fault::new(
                crate::fault::FaultKind::Timeout,
                format!("Command timed out after {} seconds", after.as_secs()),
            )),
        }
    }
}

/// A builtin capability the model can invoke.
///
/// Parameters reaching `execute` have already been validated against the
/// tool's schema, but tools still re-check anything that touches the
/// filesystem.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn description(&self) -> &str {
        schema_for(self.kind()).description
    }

    fn input_schema(&self) -> Value {
        schema_for(self.kind()).to_json()
    }

    async fn execute(&self, params: Parameters) -> ToolResult;

    fn to_llm_tool(&self) -> LlmTool {
        LlmTool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool of the same kind.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.kind(), Arc::new(tool));
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn Tool>> {
        self.tools.get(&kind).cloned()
    }

    /// Resolve a name (including aliases) to a registered tool.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        name.parse::<ToolKind>().ok().and_then(|kind| self.get(kind))
    }

    pub async fn execute(&self, name: &str, params: Parameters) -> ToolResult {
        match self.lookup(name) {
            Some(tool) => tool.execute(params).await,
            None => ToolResult::Failed(Fault::new(
                crate::fault::FaultKind::Key,
                format!("Unknown tool: {}", name),
            )),
        }
    }

    /// Definitions for every registered tool, in `ToolKind` order.
    pub fn get_definitions(&self) -> Vec<LlmTool> {
        let mut kinds: Vec<_> = self.tools.keys().copied().collect();
        kinds.sort();
        kinds.iter().map(|k| self.tools[k].to_llm_tool()).collect()
    }

    pub fn list(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.tools.keys().copied().collect();
        kinds.sort();
        kinds.into_iter().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
