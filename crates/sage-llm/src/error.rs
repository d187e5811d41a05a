//! Error types for completion calls.

use std::time::Duration;

use sage_core::error::SageError;

/// Failure of a single completion attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    /// The endpoint asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl CompletionError {
    /// Whether the client may retry this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::RateLimited(_))
    }
}

impl From<CompletionError> for SageError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::RateLimited(msg) => SageError::RateLimited(msg),
            other => SageError::Upstream(other.to_string()),
        }
    }
}
