//! Command tool: run a shell command in the project root with a hard timeout

use super::{str_param, truncate_chars};
use crate::fault::Fault;
use crate::registry::{Tool, ToolResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use toolgate_core::{Parameters, ToolKind, ToolsConfig};
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct CommandTool {
    project_root: PathBuf,
    timeout: Duration,
    max_output_chars: usize,
}

impl CommandTool {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        let defaults = ToolsConfig::default();
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            timeout: defaults.command_timeout(),
            max_output_chars: defaults.max_output_chars,
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            project_root: config.project_root.clone(),
            timeout: config.command_timeout(),
            max_output_chars: config.max_output_chars,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` under `sh -c`. The child is killed if the timeout fires,
    /// since dropping the wait future drops the child handle.
    pub async fn run(&self, command: &str) -> ToolResult {
        debug!("exec: {}", command.chars().take(80).collect::<String>());

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => return ToolResult::Failed(Fault::io("Failed to spawn", e)),
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => self.format_output(&output),
            Ok(Err(e)) => ToolResult::Failed(Fault::io("Failed to wait", e)),
            Err(_) => {
                warn!("command timed out after {:?}: {}", self.timeout, command);
                ToolResult::TimedOut { after: self.timeout }
            }
        }
    }

    fn format_output(&self, output: &std::process::Output) -> ToolResult {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let result = format!(
            "Exit code: {}\nStdout: {}\nStderr: {}",
            output.status.code().unwrap_or(-1),
            stdout,
            stderr
        );
        ToolResult::text(truncate_chars(&result, self.max_output_chars))
    }
}

#[async_trait::async_trait]
impl Tool for CommandTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ExecuteCommand
    }

    async fn execute(&self, params: Parameters) -> ToolResult {
        match str_param(&params, "command") {
            Ok(command) => self.run(command).await,
            Err(fault) => ToolResult::Failed(fault),
        }
    }
}
