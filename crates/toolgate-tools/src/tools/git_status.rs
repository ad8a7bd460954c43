//! Git status tool, a fixed command run through the command tool

use super::command::CommandTool;
use crate::registry::{Tool, ToolResult};
use toolgate_core::{Parameters, ToolKind};

pub struct GitStatusTool {
    command: CommandTool,
}

impl GitStatusTool {
    pub fn new(command: CommandTool) -> Self {
        Self { command }
    }
}

#[async_trait::async_trait]
impl Tool for GitStatusTool {
    fn kind(&self) -> ToolKind {
        ToolKind::GitStatus
    }

    async fn execute(&self, _params: Parameters) -> ToolResult {
        self.command.run("git status").await
    }
}
