//! LLM Provider trait

use crate::types::{LlmRequest, StreamDelta};
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Stream a completion response. If `cancel` is provided and triggered,
    /// the underlying HTTP connection is dropped and the stream yields `LlmError::Cancelled`.
    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream>;
}

/// Map a non-success HTTP status to an error.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: String) -> LlmError {
    tracing::error!("{} error {}: {}", provider, status, body);
    match status.as_u16() {
        401 | 403 => LlmError::AuthFailed(body),
        429 => LlmError::RateLimited { retry_after_ms: 60_000 },
        _ => LlmError::RequestFailed(format!("{}: {}", status, body)),
    }
}

/// Wrap a stream so it ends with `Cancelled` once the token fires.
pub(crate) fn with_cancel(stream: LlmStream, cancel: Option<CancellationToken>) -> LlmStream {
    let Some(cancel) = cancel else { return stream };
    Box::pin(async_stream::stream! {
        use futures::StreamExt;
        let mut stream = stream;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            match next {
                None => {
                    yield Err(LlmError::Cancelled);
                    break;
                }
                Some(Some(item)) => yield item,
                Some(None) => break,
            }
        }
    })
}
