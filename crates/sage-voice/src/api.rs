use async_trait::async_trait;

use sage_core::types::VoiceDescriptor;

use crate::error::VoiceError;
use crate::format::AudioFormat;

/// Remote speech service.
///
/// Implementations report failures as [`VoiceError::Api`]; the
/// [`crate::SpeechBridge`] attributes them to a stage.
#[async_trait]
pub trait VoiceApi: Send + Sync {
    fn name(&self) -> &str;

    /// Speech-to-text on an already normalized clip.
    async fn transcribe(&self, audio: Vec<u8>, format: AudioFormat) -> Result<String, VoiceError>;

    /// Text-to-speech; returns MP3 bytes.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError>;

    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, VoiceError>;
}
