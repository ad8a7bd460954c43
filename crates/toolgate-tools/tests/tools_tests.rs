//! Tests for toolgate-tools: validator, ToolResult, ToolRegistry, and the builtin tools against a real filesystem

use serde_json::{json, Value};
use std::time::{Duration, Instant};
use toolgate_core::{Parameters, ToolKind, ToolsConfig};
use toolgate_tools::tools::command::CommandTool;
use toolgate_tools::validator::{self, check_command};
use toolgate_tools::*;

fn params(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

fn workspace() -> (tempfile::TempDir, ToolRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let config = ToolsConfig {
        project_root: dir.path().to_path_buf(),
        ..ToolsConfig::default()
    };
    let registry = create_default_registry(&config);
    (dir, registry)
}

fn valid_params(kind: ToolKind) -> Parameters {
    match kind {
        ToolKind::ExecuteCommand => params(json!({"command": "echo hi"})),
        ToolKind::ReadFile => params(json!({"file_path": "src/main.rs"})),
        ToolKind::WriteFile => params(json!({"file_path": "out.txt", "content": ""})),
        ToolKind::ListFiles => params(json!({"directory": "src"})),
        ToolKind::GitStatus => Parameters::new(),
    }
}

// ===========================================================================
// Validator
// ===========================================================================

#[test]
fn valid_parameters_pass_for_every_tool() {
    let v = ParameterValidator::new();
    for kind in ToolKind::all() {
        let (ok, msg) = v.verdict(kind.as_str(), &valid_params(*kind));
        assert!(ok, "{}: {}", kind, msg);
        assert_eq!(msg, "Parameters valid");
    }
}

#[test]
fn missing_required_parameter_is_named() {
    let v = ParameterValidator::new();
    for kind in ToolKind::all() {
        let schema = schema_for(*kind);
        for required in schema.required {
            let mut p = valid_params(*kind);
            p.remove(*required);
            let (ok, msg) = v.verdict(kind.as_str(), &p);
            assert!(!ok);
            assert!(msg.contains(required), "{} should name {}", msg, required);
        }
    }
}

#[test]
fn unknown_tool_rejected() {
    let v = ParameterValidator::new();
    assert_eq!(
        v.validate("format_disk", &Parameters::new()),
        Err(ValidationError::UnknownTool("format_disk".into()))
    );
    assert_eq!(v.verdict("format_disk", &Parameters::new()).1, "Unknown tool: format_disk");
}

#[test]
fn alias_resolves_to_command_tool() {
    let v = ParameterValidator::new();
    let kind = v.validate("execute_bash", &params(json!({"command": "ls"}))).unwrap();
    assert_eq!(kind, ToolKind::ExecuteCommand);
}

#[test]
fn dangerous_commands_rejected() {
    let v = ParameterValidator::new();
    for cmd in ["sudo reboot", "SUDO ls", "rm -rf / --no-preserve-root", "echo x && mkfs.ext4 /dev/sda", "dd if=/dev/zero of=x"] {
        let (ok, msg) = v.verdict("execute_command", &params(json!({"command": cmd})));
        assert!(!ok, "{} should be rejected", cmd);
        assert!(msg.contains("dangerous"), "{}", msg);
    }
    assert_eq!(
        check_command("sudo reboot"),
        Err(ValidationError::UnsafeCommand("sudo"))
    );
}

#[test]
fn denylist_is_substring_based() {
    // "service" matches inside a longer word
    assert!(validator::check_command("cat microservice.log").is_err());
    assert!(validator::check_command("ls -la").is_ok());
}

#[test]
fn traversal_and_absolute_paths_rejected() {
    let v = ParameterValidator::new();
    let (ok, msg) = v.verdict("read_file", &params(json!({"file_path": "../../etc/passwd"})));
    assert!(!ok);
    assert!(msg.contains("traversal"));

    let (ok, msg) = v.verdict("write_file", &params(json!({"file_path": "/etc/passwd", "content": "x"})));
    assert!(!ok);
    assert!(msg.contains("Absolute"));

    let (ok, msg) = v.verdict("read_file", &params(json!({"file_path": "\\windows\\system32"})));
    assert!(!ok);
    assert!(msg.contains("Absolute"));

    let (ok, _) = v.verdict("list_files", &params(json!({"directory": "../.."})));
    assert!(!ok);
}

#[test]
fn traversal_checked_before_absolute() {
    assert_eq!(
        validator::check_relative_path("/a/../b"),
        Err(ValidationError::PathTraversal)
    );
}

#[test]
fn type_and_length_checks() {
    let v = ParameterValidator::new();
    assert_eq!(
        v.verdict("read_file", &params(json!({"file_path": 42}))).1,
        "Parameter file_path must be a string"
    );
    assert_eq!(
        v.verdict("execute_command", &params(json!({"command": ""}))).1,
        "Parameter command must be at least 1 characters"
    );
    // empty content is allowed
    assert!(v.verdict("write_file", &params(json!({"file_path": "a", "content": ""}))).0);
}

#[test]
fn missing_checked_before_type() {
    let v = ParameterValidator::new();
    let err = v.validate("write_file", &params(json!({"file_path": 1}))).unwrap_err();
    assert_eq!(err, ValidationError::MissingParameter("content".into()));
}

#[test]
fn unknown_parameters_are_ignored() {
    let v = ParameterValidator::new();
    assert!(v.verdict("git_status", &params(json!({"verbose": true}))).0);
}

// ===========================================================================
// ToolResult
// ===========================================================================

#[test]
fn tool_result_text() {
    let r = ToolResult::text("hello");
    assert!(!r.is_error());
    assert!(r.fault().is_none());
    assert_eq!(r.to_content_string(), "hello");
}

#[test]
fn tool_result_failed() {
    let r = ToolResult::Failed(Fault::new(FaultKind::NotFound, "boom"));
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "Error: boom");
    assert_eq!(r.fault().unwrap().kind, FaultKind::NotFound);
}

#[test]
fn tool_result_timeout_is_distinct() {
    let r = ToolResult::TimedOut { after: Duration::from_secs(30) };
    assert!(r.is_error());
    assert_eq!(r.to_content_string(), "Error: Command timed out after 30 seconds");
    assert_eq!(r.fault().unwrap().kind, FaultKind::Timeout);
}

// ===========================================================================
// Faults
// ===========================================================================

#[test]
fn io_errors_keep_their_kind() {
    let f: Fault = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert_eq!(f.kind, FaultKind::NotFound);
    let f: Fault = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no").into();
    assert_eq!(f.kind, FaultKind::PermissionDenied);
    let f: Fault = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no").into();
    assert_eq!(f.kind, FaultKind::Connection);
    let f = Fault::io("Failed to read x", std::io::Error::new(std::io::ErrorKind::Other, "odd"));
    assert_eq!(f.kind, FaultKind::Other);
    assert!(f.message.starts_with("Failed to read x: "));
}

#[test]
fn json_errors_classified() {
    let f: Fault = serde_json::from_str::<Value>("{").unwrap_err().into();
    assert_eq!(f.kind, FaultKind::InvalidValue);
    let f: Fault = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
    assert_eq!(f.kind, FaultKind::Type);
}

#[test]
fn llm_errors_classified() {
    let f: Fault = toolgate_llm::LlmError::AuthFailed("bad key".into()).into();
    assert_eq!(f.kind, FaultKind::Auth);
    let f: Fault = toolgate_llm::LlmError::RateLimited { retry_after_ms: 1 }.into();
    assert_eq!(f.kind, FaultKind::Connection);
    let f: Fault = toolgate_llm::LlmError::Cancelled.into();
    assert_eq!(f.kind, FaultKind::Interrupted);
}

#[tokio::test]
async fn panicking_task_becomes_fault() {
    let handle = tokio::spawn(async {
        if true {
            panic!("kaboom");
        }
    });
    let f: Fault = handle.await.unwrap_err().into();
    assert_eq!(f.kind, FaultKind::Other);
    assert!(f.message.contains("kaboom"));
}

// ===========================================================================
// ToolRegistry
// ===========================================================================

#[test]
fn registry_default_is_empty() {
    let reg = ToolRegistry::new();
    assert!(reg.is_empty());
    assert!(reg.get_definitions().is_empty());
}

#[tokio::test]
async fn registry_unknown_tool() {
    let (_dir, reg) = workspace();
    let r = reg.execute("format_disk", Parameters::new()).await;
    assert_eq!(r.to_content_string(), "Error: Unknown tool: format_disk");
}

#[test]
fn default_registry_has_all_tools() {
    let (_dir, reg) = workspace();
    assert_eq!(reg.len(), 5);
    assert_eq!(
        reg.list(),
        vec!["execute_command", "read_file", "write_file", "list_files", "git_status"]
    );
    assert!(reg.lookup("execute_bash").is_some());
}

#[test]
fn definitions_carry_schema() {
    let (_dir, reg) = workspace();
    let defs = reg.get_definitions();
    assert_eq!(defs.len(), 5);
    let write = defs.iter().find(|d| d.name == "write_file").unwrap();
    assert_eq!(write.input_schema["required"], json!(["file_path", "content"]));
    assert!(!write.description.is_empty());
}

// ===========================================================================
// Builtin tools
// ===========================================================================

#[tokio::test]
async fn write_then_read_roundtrip() {
    let (dir, reg) = workspace();
    let w = reg
        .execute("write_file", params(json!({"file_path": "nested/deep/out.txt", "content": "hello"})))
        .await;
    assert!(!w.is_error(), "{}", w.to_content_string());
    assert!(dir.path().join("nested/deep/out.txt").exists());

    let r = reg.execute("read_file", params(json!({"file_path": "nested/deep/out.txt"}))).await;
    assert_eq!(r, ToolResult::Text("hello".into()));
}

#[tokio::test]
async fn read_missing_file_is_not_found() {
    let (_dir, reg) = workspace();
    let r = reg.execute("read_file", params(json!({"file_path": "nope.txt"}))).await;
    assert!(r.to_content_string().starts_with("Error: "));
    assert_eq!(r.fault().unwrap().kind, FaultKind::NotFound);
}

#[tokio::test]
async fn tools_recheck_paths() {
    let (_dir, reg) = workspace();
    let r = reg.execute("read_file", params(json!({"file_path": "../secret"}))).await;
    assert_eq!(r.fault().unwrap().kind, FaultKind::PermissionDenied);
    assert_eq!(r.to_content_string(), "Error: Directory traversal not allowed");
}

#[tokio::test]
async fn list_files_sorted_and_tagged() {
    let (dir, reg) = workspace();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("b.txt"), "").unwrap();
    std::fs::write(dir.path().join("a.txt"), "").unwrap();

    let r = reg.execute("list_files", Parameters::new()).await;
    assert_eq!(r.to_content_string(), "FILE: a.txt\nFILE: b.txt\nDIR: sub");
}

#[tokio::test]
async fn list_empty_directory() {
    let (dir, reg) = workspace();
    std::fs::create_dir(dir.path().join("empty")).unwrap();
    let r = reg.execute("list_files", params(json!({"directory": "empty"}))).await;
    assert_eq!(r.to_content_string(), "(empty directory)");
}

#[tokio::test]
async fn command_reports_exit_code_and_streams() {
    let (_dir, reg) = workspace();
    let r = reg
        .execute("execute_command", params(json!({"command": "echo out; echo err >&2; exit 3"})))
        .await;
    assert_eq!(r.to_content_string(), "Exit code: 3\nStdout: out\n\nStderr: err\n");
}

#[tokio::test]
async fn command_runs_in_project_root() {
    let (dir, reg) = workspace();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();
    let r = reg.execute("execute_command", params(json!({"command": "ls"}))).await;
    assert!(r.to_content_string().contains("marker.txt"));
}

#[tokio::test]
async fn command_timeout_returns_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let tool = CommandTool::new(dir.path()).with_timeout(Duration::from_secs(1));
    let start = Instant::now();
    let r = tool.run("sleep 5").await;
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(r, ToolResult::TimedOut { after: Duration::from_secs(1) });
    assert!(r.to_content_string().contains("timed out"));
}

#[tokio::test]
async fn command_output_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let config = ToolsConfig {
        project_root: dir.path().to_path_buf(),
        max_output_chars: 50,
        ..ToolsConfig::default()
    };
    let tool = CommandTool::from_config(&config);
    let r = tool.run("printf 'x%.0s' $(seq 1 200)").await;
    let text = r.to_content_string();
    assert!(text.contains("[truncated,"));
}
