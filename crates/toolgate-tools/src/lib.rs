//! toolgate tools - schemas, pre-flight validation, and the builtin tool set
//!
//! Each tool is a self-contained file in src/tools/. Its parameter schema
//! lives in the table in `schema`, which the validator and the advertised
//! JSON schema share.

pub mod fault;
pub mod registry;
pub mod schema;
pub mod tools;
pub mod validator;

pub use fault::{Fault, FaultKind};
pub use registry::{Tool, ToolRegistry, ToolResult};
pub use schema::{schema_for, ParamType, ToolSchema};
pub use validator::{ParameterValidator, ValidationError, DANGEROUS_COMMANDS};

use toolgate_core::ToolsConfig;

/// Build the registry with all five builtin tools rooted at the configured
/// project root.
pub fn create_default_registry(config: &ToolsConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let root = config.project_root.as_path();
    let command = tools::command::CommandTool::from_config(config);

    registry.register(tools::read_file::ReadFileTool::new(root));
    registry.register(tools::list_files::ListFilesTool::new(root));
    registry.register(tools::git_status::GitStatusTool::new(command.clone()));

    registry.register(tools::write_file::WriteFileTool::new(root));
    registry.register(command);

    registry
}
