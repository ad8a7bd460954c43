//! Read tool: whole-file text read

use super::{resolve, str_param};
use crate::fault::Fault;
use crate::registry::{Tool, ToolResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use toolgate_core::{Parameters, ToolKind};
use tracing::debug;

pub struct ReadFileTool {
    project_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self { project_root: project_root.as_ref().to_path_buf() }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ReadFile
    }

    async fn execute(&self, params: Parameters) -> ToolResult {
        let path = match str_param(&params, "file_path").and_then(|p| resolve(&self.project_root, p)) {
            Ok(path) => path,
            Err(fault) => return ToolResult::Failed(fault),
        };
        debug!("read: {}", path.display());

        match fs::read_to_string(&path).await {
            Ok(content) => ToolResult::Text(content),
            Err(e) => ToolResult::Failed(Fault::io(&format!("Failed to read {}", path.display()), e)),
        }
    }
}
