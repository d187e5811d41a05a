//! In-process voice doubles for tests and offline runs.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use sage_core::types::VoiceDescriptor;

use crate::api::VoiceApi;
use crate::error::VoiceError;
use crate::format::AudioFormat;
use crate::normalizer::AudioNormalizer;

/// Fake voice API with switchable failures and call counters.
#[derive(Debug, Default)]
pub struct MockVoiceApi {
    transcript: String,
    voices: Vec<VoiceDescriptor>,
    delay: Option<Duration>,
    fail_transcribe: AtomicBool,
    fail_synthesize: AtomicBool,
    transcribe_calls: AtomicUsize,
    synthesize_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockVoiceApi {
    /// Transcribes every clip as `transcript`.
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            ..Self::default()
        }
    }

    pub fn with_voices(mut self, voices: Vec<VoiceDescriptor>) -> Self {
        self.voices = voices;
        self
    }

    /// Sleep this long inside every remote call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_fail_transcribe(&self, fail: bool) {
        self.fail_transcribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_synthesize(&self, fail: bool) {
        self.fail_synthesize.store(fail, Ordering::SeqCst);
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn synthesize_calls(&self) -> usize {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl VoiceApi for MockVoiceApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(&self, audio: Vec<u8>, _format: AudioFormat) -> Result<String, VoiceError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_transcribe.load(Ordering::SeqCst) {
            return Err(VoiceError::Api("503: transcription unavailable".to_string()));
        }
        if audio.is_empty() {
            return Err(VoiceError::Api("400: empty file".to_string()));
        }
        Ok(self.transcript.clone())
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, VoiceError> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_synthesize.load(Ordering::SeqCst) {
            return Err(VoiceError::Api(format!("404: voice {} not found", voice_id)));
        }
        Ok(format!("MP3:{}:{}", voice_id, text).into_bytes())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, VoiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.voices.clone())
    }
}

/// Copies the input to the output path unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughNormalizer;

#[async_trait]
impl AudioNormalizer for PassthroughNormalizer {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), VoiceError> {
        tokio::fs::copy(input, output)
            .await
            .map(|_| ())
            .map_err(|e| VoiceError::Normalization(e.to_string()))
    }
}

/// Always fails, as a broken or missing converter would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNormalizer;

#[async_trait]
impl AudioNormalizer for FailingNormalizer {
    async fn convert(&self, input: &Path, _output: &Path) -> Result<(), VoiceError> {
        Err(VoiceError::Normalization(format!(
            "cannot decode {}",
            input.display()
        )))
    }
}
