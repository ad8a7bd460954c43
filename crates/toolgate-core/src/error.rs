//! Error types for toolgate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid session name: {0}")]
    InvalidSessionName(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_session_name(name: impl Into<String>) -> Self {
        Self::InvalidSessionName(name.into())
    }
}
