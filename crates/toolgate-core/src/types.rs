//! Core types for toolgate

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tool parameters as received from the model. Keys are kept sorted, so two
/// maps with the same entries compare equal regardless of insertion order.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Session name - cheaply cloneable, restricted to filename-safe characters
/// because it names files in the context directory.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
        if s.is_empty() || s.contains("..") || !s.chars().all(allowed) {
            return Err(Error::invalid_session_name(s));
        }
        Ok(Self(Arc::from(s)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The fixed set of local tools the model may invoke.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ExecuteCommand,
    ReadFile,
    WriteFile,
    ListFiles,
    GitStatus,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::ExecuteCommand,
            ToolKind::ReadFile,
            ToolKind::WriteFile,
            ToolKind::ListFiles,
            ToolKind::GitStatus,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::ExecuteCommand => "execute_command",
            ToolKind::ReadFile => "read_file",
            ToolKind::WriteFile => "write_file",
            ToolKind::ListFiles => "list_files",
            ToolKind::GitStatus => "git_status",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "execute_command" | "execute_bash" => Ok(ToolKind::ExecuteCommand),
            "read_file" => Ok(ToolKind::ReadFile),
            "write_file" => Ok(ToolKind::WriteFile),
            "list_files" => Ok(ToolKind::ListFiles),
            "git_status" => Ok(ToolKind::GitStatus),
            _ => Err(Error::UnknownTool(s.to_string())),
        }
    }
}
