//! Error types for the response pipeline.

use sage_core::error::SageError;

use crate::types::PipelineState;

/// Errors raised by the orchestrator itself rather than a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid pipeline transition: {from} -> {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

impl From<PipelineError> for SageError {
    fn from(err: PipelineError) -> Self {
        SageError::Validation(err.to_string())
    }
}
