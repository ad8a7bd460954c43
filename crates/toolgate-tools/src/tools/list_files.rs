//! List tool: immediate children of a directory, tagged DIR/FILE

use super::resolve;
use crate::fault::{Fault, FaultKind};
use crate::registry::{Tool, ToolResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use toolgate_core::{Parameters, ToolKind};

pub struct ListFilesTool {
    project_root: PathBuf,
}

impl ListFilesTool {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self { project_root: project_root.as_ref().to_path_buf() }
    }

    async fn list(&self, directory: &str) -> Result<Vec<String>, Fault> {
        let dir = resolve(&self.project_root, directory)?;
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| Fault::io(&format!("Failed to list {}", directory), e))?;

        let mut lines = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            lines.push((name, is_dir));
        }
        lines.sort();
        Ok(lines
            .into_iter()
            .map(|(name, is_dir)| if is_dir { format!("DIR: {}", name) } else { format!("FILE: {}", name) })
            .collect())
    }
}

#[async_trait::async_trait]
impl Tool for ListFilesTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ListFiles
    }

    async fn execute(&self, params: Parameters) -> ToolResult {
        let directory = match params.get("directory") {
            None => ".",
            Some(v) => match v.as_str() {
                Some(s) => s,
                None => {
                    return ToolResult::Failed(Fault::new(
                        FaultKind::Type,
                        "Parameter directory must be a string",
                    ))
                }
            },
        };

        match self.list(directory).await {
            Ok(lines) if lines.is_empty() => ToolResult::text("(empty directory)"),
            Ok(lines) => ToolResult::Text(lines.join("\n")),
            Err(fault) => ToolResult::Failed(fault),
        }
    }
}
