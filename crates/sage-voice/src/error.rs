//! Error types for the speech bridge.

use sage_core::error::SageError;

/// Errors from transcription, synthesis and the voice catalogue.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    /// Container/codec conversion failed before the audio reached the API.
    #[error("audio normalization failed: {0}")]
    Normalization(String),
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("voice catalogue unavailable: {0}")]
    Catalogue(String),
    /// Raw failure from the remote voice API, before stage attribution.
    #[error("voice API error: {0}")]
    Api(String),
}

impl From<VoiceError> for SageError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::UnsupportedFormat(_) | VoiceError::Transcription(_) => {
                SageError::Transcription(err.to_string())
            }
            VoiceError::Normalization(_) => SageError::AudioFormat(err.to_string()),
            VoiceError::Synthesis(_) => SageError::Synthesis(err.to_string()),
            VoiceError::Catalogue(_) | VoiceError::Api(_) => {
                SageError::Upstream(err.to_string())
            }
        }
    }
}
