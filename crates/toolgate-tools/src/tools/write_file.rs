//! Write tool: whole-file write, creating parent directories

use super::{resolve, str_param};
use crate::fault::Fault;
use crate::registry::{Tool, ToolResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use toolgate_core::{Parameters, ToolKind};
use tracing::debug;

pub struct WriteFileTool {
    project_root: PathBuf,
}

impl WriteFileTool {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self { project_root: project_root.as_ref().to_path_buf() }
    }
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WriteFile
    }

    async fn execute(&self, params: Parameters) -> ToolResult {
        let file_path = match str_param(&params, "file_path") {
            Ok(p) => p,
            Err(fault) => return ToolResult::Failed(fault),
        };
        let content = match str_param(&params, "content") {
            Ok(c) => c,
            Err(fault) => return ToolResult::Failed(fault),
        };
        let path = match resolve(&self.project_root, file_path) {
            Ok(path) => path,
            Err(fault) => return ToolResult::Failed(fault),
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ToolResult::Failed(Fault::io("Failed to create directories", e));
            }
        }

        match fs::write(&path, content).await {
            Ok(()) => {
                debug!("wrote {} bytes to {}", content.len(), path.display());
                ToolResult::text(format!("Successfully wrote to {}", file_path))
            }
            Err(e) => ToolResult::Failed(Fault::io(&format!("Failed to write {}", file_path), e)),
        }
    }
}
