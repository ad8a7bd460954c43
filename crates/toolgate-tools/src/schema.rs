//! Static parameter schemas for the builtin tools.
//!
//! One table drives both the pre-flight validator and the JSON input schema
//! advertised to the model.

use serde_json::{json, Map, Value};
use toolgate_core::ToolKind;

/// JSON type of a tool parameter. Every builtin tool takes strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
}

impl ParamType {
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub ty: ParamType,
    /// Minimum length in characters; only meaningful for strings.
    pub min_length: usize,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

/// Tool-specific security check applied after the generic schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    None,
    /// Denylist scan of a shell command parameter.
    Command(&'static str),
    /// Lexical path check of a file-path parameter.
    Path(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSchema {
    pub kind: ToolKind,
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub properties: &'static [PropertySpec],
    pub guard: Guard,
}

static SCHEMAS: [ToolSchema; 5] = [
    ToolSchema {
        kind: ToolKind::ExecuteCommand,
        description: "Execute a shell command in the project root. Requires: command (string)",
        required: &["command"],
        properties: &[PropertySpec {
            name: "command",
            ty: ParamType::String,
            min_length: 1,
            default: None,
            description: "Shell command to execute",
        }],
        guard: Guard::Command("command"),
    },
    ToolSchema {
        kind: ToolKind::ReadFile,
        description: "Read file content from the project. Requires: file_path (string)",
        required: &["file_path"],
        properties: &[PropertySpec {
            name: "file_path",
            ty: ParamType::String,
            min_length: 1,
            default: None,
            description: "Project-relative path of the file to read",
        }],
        guard: Guard::Path("file_path"),
    },
    ToolSchema {
        kind: ToolKind::WriteFile,
        description: "Write content to a file. Requires: file_path (string), content (string)",
        required: &["file_path", "content"],
        properties: &[
            PropertySpec {
                name: "file_path",
                ty: ParamType::String,
                min_length: 1,
                default: None,
                description: "Project-relative path of the file to write",
            },
            PropertySpec {
                name: "content",
                ty: ParamType::String,
                min_length: 0,
                default: None,
                description: "Content to write",
            },
        ],
        guard: Guard::Path("file_path"),
    },
    ToolSchema {
        kind: ToolKind::ListFiles,
        description: "List files in a directory. Optional: directory (string, defaults to current)",
        required: &[],
        properties: &[PropertySpec {
            name: "directory",
            ty: ParamType::String,
            min_length: 0,
            default: Some("."),
            description: "Project-relative directory path",
        }],
        guard: Guard::Path("directory"),
    },
    ToolSchema {
        kind: ToolKind::GitStatus,
        description: "Get git repository status. No parameters required",
        required: &[],
        properties: &[],
        guard: Guard::None,
    },
];

pub fn schema_for(kind: ToolKind) -> &'static ToolSchema {
    match kind {
        ToolKind::ExecuteCommand => &SCHEMAS[0],
        ToolKind::ReadFile => &SCHEMAS[1],
        ToolKind::WriteFile => &SCHEMAS[2],
        ToolKind::ListFiles => &SCHEMAS[3],
        ToolKind::GitStatus => &SCHEMAS[4],
    }
}

impl ToolSchema {
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// JSON Schema object sent to the model as the tool's input schema.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for prop in self.properties {
            let mut entry = json!({
                "type": prop.ty.name(),
                "description": prop.description,
            });
            if prop.ty == ParamType::String && prop.min_length > 0 {
                entry["minLength"] = json!(prop.min_length);
            }
            if let Some(default) = prop.default {
                entry["default"] = json!(default);
            }
            properties.insert(prop.name.to_string(), entry);
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_kind() {
        for kind in ToolKind::all() {
            assert_eq!(schema_for(*kind).kind, *kind);
        }
    }

    #[test]
    fn required_names_are_declared_properties() {
        for kind in ToolKind::all() {
            let schema = schema_for(*kind);
            for name in schema.required {
                assert!(schema.property(name).is_some(), "{} missing {}", kind, name);
            }
        }
    }

    #[test]
    fn json_schema_shape() {
        let schema = schema_for(ToolKind::WriteFile).to_json();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["file_path", "content"]));
        assert_eq!(schema["properties"]["file_path"]["minLength"], 1);
        assert!(schema["properties"]["content"].get("minLength").is_none());
    }
}
