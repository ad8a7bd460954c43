//! toolgate core - shared types, configuration, and error handling

pub mod config;
pub mod error;
pub mod smoothing;
pub mod types;

pub use config::{Dialect, GateConfig, LlmConfig, PatternThresholds, SessionConfig, ToolsConfig};
pub use error::{Error, Result};
pub use smoothing::Ema;
pub use types::*;
