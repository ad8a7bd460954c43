//! toolgate configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. Secrets are never read
//! from the environment here; the binary injects them into [`LlmConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// LLM endpoint and model selection.
    pub llm: LlmConfig,
    /// Tool execution limits.
    pub tools: ToolsConfig,
    /// Pattern monitor thresholds.
    pub patterns: PatternThresholds,
    /// Session storage.
    pub sessions: SessionConfig,
}

/// HTTP dialect spoken by the LLM endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Anthropic,
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub dialect: Dialect,
    /// Base URL without the endpoint path. Empty selects the dialect default.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on model round-trips per user turn.
    pub max_tool_iterations: usize,
    /// Environment variable the binary reads the key from.
    pub api_key_env: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root that every file path and command working directory is pinned to.
    pub project_root: PathBuf,
    pub command_timeout_secs: u64,
    /// Command output beyond this many characters is truncated.
    pub max_output_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// Failed calls inside the window that mark the pattern erroneous.
    pub max_errors_in_window: usize,
    /// Trailing identical calls that mark the pattern repetitive.
    pub max_repetitive_calls: usize,
    /// Trailing failures with one error message that mark the pattern erroneous.
    pub max_identical_failures: usize,
    /// Trailing same-tool failures that mark the pattern looping.
    pub loop_length: usize,
    /// Sliding window length in seconds.
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory for the session table and transcripts. Relative paths are
    /// resolved against `tools.project_root`.
    pub context_dir: PathBuf,
    /// Session used when none is given on the command line.
    pub default_session: String,
}

// ============================================================
// Defaults
// ============================================================

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Anthropic,
            base_url: String::new(),
            model: "deepseek-chat".to_string(),
            max_tokens: 4096,
            max_tool_iterations: 10,
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            api_key: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            command_timeout_secs: 30,
            max_output_chars: 30_000,
        }
    }
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            max_errors_in_window: 10,
            max_repetitive_calls: 3,
            max_identical_failures: 3,
            loop_length: 6,
            window_secs: 300,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from("chat_context"),
            default_session: "default".to_string(),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl GateConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Session directory resolved against the project root.
    pub fn context_dir(&self) -> PathBuf {
        if self.sessions.context_dir.is_absolute() {
            self.sessions.context_dir.clone()
        } else {
            self.tools.project_root.join(&self.sessions.context_dir)
        }
    }
}

impl ToolsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl PatternThresholds {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
