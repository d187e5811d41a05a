use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the Sage assistant.
///
/// Each variant corresponds to one error kind the response pipeline reasons
/// about. Subsystem crates define their own narrower error types and
/// implement `From<SubsystemError> for SageError` so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SageError {
    /// The logging/reporting tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SageError::Config(_) => ErrorKind::Config,
            SageError::Validation(_) => ErrorKind::Validation,
            SageError::Storage(_) => ErrorKind::Storage,
            SageError::Upstream(_) => ErrorKind::Upstream,
            SageError::RateLimited(_) => ErrorKind::RateLimit,
            SageError::Transcription(_) => ErrorKind::Transcription,
            SageError::AudioFormat(_) => ErrorKind::AudioFormat,
            SageError::Synthesis(_) => ErrorKind::Synthesis,
            SageError::Io(_) => ErrorKind::Io,
            SageError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Plain tag describing what kind of failure occurred.
///
/// Carried in pipeline results and log fields where the full error value
/// is not needed (or not `Clone`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Validation,
    Storage,
    Upstream,
    RateLimit,
    Transcription,
    AudioFormat,
    Synthesis,
    Io,
    Serialization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Config => "config",
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
            ErrorKind::Upstream => "upstream",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Transcription => "transcription",
            ErrorKind::AudioFormat => "audio_format",
            ErrorKind::Synthesis => "synthesis",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        };
        f.write_str(s)
    }
}

impl From<toml::de::Error> for SageError {
    fn from(err: toml::de::Error) -> Self {
        SageError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SageError {
    fn from(err: toml::ser::Error) -> Self {
        SageError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SageError {
    fn from(err: serde_json::Error) -> Self {
        SageError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Sage operations.
pub type Result<T> = std::result::Result<T, SageError>;
