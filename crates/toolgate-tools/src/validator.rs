//! Pre-flight parameter validation
//!
//! Runs before any side effect: schema checks (required, type, length) from
//! the table in `schema`, then the tool's security guard. The command
//! denylist is a substring scan, not a shell parser; it stops careless calls,
//! it is not a sandbox.

use crate::schema::{schema_for, Guard, ParamType};
use toolgate_core::{Parameters, ToolKind};

/// Case-insensitive substrings that reject a shell command.
pub const DANGEROUS_COMMANDS: &[&str] = &[
    "rm -rf /",
    "sudo",
    "chmod 777",
    "dd if=",
    ":(){ :|:& };:",
    "mkfs",
    "fdisk",
    "iptables",
    "systemctl",
    "service",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Parameter {name} must be a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Parameter {name} must be at least {min_length} characters")]
    TooShort { name: String, min_length: usize },

    #[error("Potentially dangerous command detected: {0}")]
    UnsafeCommand(&'static str),

    #[error("Directory traversal not allowed")]
    PathTraversal,

    #[error("Absolute paths not allowed")]
    AbsolutePathNotAllowed,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterValidator;

impl ParameterValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a call. Returns the resolved tool on success.
    pub fn validate(&self, tool_name: &str, parameters: &Parameters) -> Result<ToolKind, ValidationError> {
        let kind: ToolKind = tool_name
            .parse()
            .map_err(|_| ValidationError::UnknownTool(tool_name.to_string()))?;
        let schema = schema_for(kind);

        for required in schema.required {
            if !parameters.contains_key(*required) {
                return Err(ValidationError::MissingParameter(required.to_string()));
            }
        }

        for (name, value) in parameters {
            let Some(prop) = schema.property(name) else { continue };
            if !prop.ty.matches(value) {
                return Err(ValidationError::TypeMismatch {
                    name: name.clone(),
                    expected: prop.ty.name(),
                });
            }
            if prop.ty == ParamType::String {
                let len = value.as_str().map_or(0, |s| s.chars().count());
                if len < prop.min_length {
                    return Err(ValidationError::TooShort {
                        name: name.clone(),
                        min_length: prop.min_length,
                    });
                }
            }
        }

        match schema.guard {
            Guard::None => {}
            Guard::Command(param) => {
                check_command(string_param(parameters, param))?;
            }
            Guard::Path(param) => {
                check_relative_path(string_param(parameters, param))?;
            }
        }

        Ok(kind)
    }

    /// `(true, "Parameters valid")` or `(false, <reason>)`.
    pub fn verdict(&self, tool_name: &str, parameters: &Parameters) -> (bool, String) {
        match self.validate(tool_name, parameters) {
            Ok(_) => (true, "Parameters valid".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }
}

fn string_param<'a>(parameters: &'a Parameters, name: &str) -> &'a str {
    parameters.get(name).and_then(|v| v.as_str()).unwrap_or("")
}

pub fn check_command(command: &str) -> Result<(), ValidationError> {
    let lower = command.to_lowercase();
    match DANGEROUS_COMMANDS.iter().find(|pattern| lower.contains(*pattern)) {
        Some(pattern) => Err(ValidationError::UnsafeCommand(pattern)),
        None => Ok(()),
    }
}

/// Purely lexical: no filesystem access.
pub fn check_relative_path(path: &str) -> Result<(), ValidationError> {
    if path.contains("..") {
        return Err(ValidationError::PathTraversal);
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(ValidationError::AbsolutePathNotAllowed);
    }
    Ok(())
}
