//! Speech bridge: audio in, text out, and back again.
//!
//! Every temporary file lives in a `TempDir` owned by the call that created
//! it, so the files are removed when the call returns, fails, or is dropped
//! mid-flight.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use sage_core::config::VoiceConfig;
use sage_core::types::VoiceDescriptor;

use crate::api::VoiceApi;
use crate::error::VoiceError;
use crate::format::AudioFormat;
use crate::normalizer::AudioNormalizer;

/// Catalogue categories that count as user-made voices.
pub const CUSTOM_VOICE_CATEGORIES: &[&str] = &["cloned", "generated", "custom"];

/// Synthesized reply audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

pub struct SpeechBridge {
    api: Arc<dyn VoiceApi>,
    normalizer: Arc<dyn AudioNormalizer>,
    timeout: Duration,
    default_voice_id: String,
    reply_format: AudioFormat,
    custom_voices_only: bool,
    temp_root: Option<PathBuf>,
    voices: OnceCell<Vec<VoiceDescriptor>>,
}

impl SpeechBridge {
    pub fn new(
        api: Arc<dyn VoiceApi>,
        normalizer: Arc<dyn AudioNormalizer>,
        default_voice_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            api,
            normalizer,
            timeout,
            default_voice_id: default_voice_id.into(),
            reply_format: AudioFormat::Mp3,
            custom_voices_only: false,
            temp_root: None,
            voices: OnceCell::new(),
        }
    }

    pub fn from_config(
        api: Arc<dyn VoiceApi>,
        normalizer: Arc<dyn AudioNormalizer>,
        config: &VoiceConfig,
    ) -> Result<Self, VoiceError> {
        let reply_format: AudioFormat = config.reply_format.parse()?;
        Ok(Self::new(
            api,
            normalizer,
            config.default_voice_id.clone(),
            Duration::from_secs(config.timeout_secs),
        )
        .with_reply_format(reply_format)
        .with_custom_voices_only(config.custom_voices_only))
    }

    pub fn with_reply_format(mut self, format: AudioFormat) -> Self {
        self.reply_format = format;
        self
    }

    pub fn with_custom_voices_only(mut self, custom_only: bool) -> Self {
        self.custom_voices_only = custom_only;
        self
    }

    /// Create temporary directories under `root` instead of the system default.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn default_voice_id(&self) -> &str {
        &self.default_voice_id
    }

    pub fn reply_format(&self) -> AudioFormat {
        self.reply_format
    }

    fn scratch_dir(&self, prefix: &str) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    /// Normalize `audio` to WAV and transcribe it.
    ///
    /// Conversion problems surface as [`VoiceError::Normalization`]; remote
    /// failures, timeouts and empty transcripts as
    /// [`VoiceError::Transcription`].
    pub async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Err(VoiceError::Transcription("audio clip is empty".to_string()));
        }

        let dir = self
            .scratch_dir("sage-stt-")
            .map_err(|e| VoiceError::Normalization(format!("cannot create temp dir: {}", e)))?;
        let input = dir.path().join(format!("input.{}", format.extension()));
        let wav = dir.path().join("normalized.wav");

        tokio::fs::write(&input, audio)
            .await
            .map_err(|e| VoiceError::Normalization(format!("cannot stage audio: {}", e)))?;
        self.normalizer.convert(&input, &wav).await?;
        let normalized = tokio::fs::read(&wav)
            .await
            .map_err(|e| VoiceError::Normalization(format!("converted audio missing: {}", e)))?;

        debug!(
            source = %format,
            in_bytes = audio.len(),
            wav_bytes = normalized.len(),
            "Audio normalized"
        );

        let text = tokio::time::timeout(self.timeout, self.api.transcribe(normalized, AudioFormat::Wav))
            .await
            .map_err(|_| VoiceError::Transcription(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| VoiceError::Transcription(e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::Transcription("no speech recognised".to_string()));
        }
        Ok(text.to_string())
    }

    /// Synthesize `text` with `voice_id` (or the default voice).
    ///
    /// Any failure, including reply-format conversion, is reported as
    /// [`VoiceError::Synthesis`].
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
    ) -> Result<SynthesizedAudio, VoiceError> {
        if text.trim().is_empty() {
            return Err(VoiceError::Synthesis("nothing to synthesize".to_string()));
        }
        let voice_id = voice_id.unwrap_or(&self.default_voice_id).trim();
        if voice_id.is_empty() {
            return Err(VoiceError::Synthesis("voice id must not be empty".to_string()));
        }

        let mp3 = tokio::time::timeout(self.timeout, self.api.synthesize(text, voice_id))
            .await
            .map_err(|_| VoiceError::Synthesis(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        if mp3.is_empty() {
            return Err(VoiceError::Synthesis("remote returned no audio".to_string()));
        }

        if self.reply_format == AudioFormat::Mp3 {
            return Ok(SynthesizedAudio {
                bytes: mp3,
                format: AudioFormat::Mp3,
            });
        }

        let bytes = self
            .convert_reply(&mp3)
            .await
            .map_err(|e| VoiceError::Synthesis(format!("reply conversion: {}", e)))?;
        Ok(SynthesizedAudio {
            bytes,
            format: self.reply_format,
        })
    }

    async fn convert_reply(&self, mp3: &[u8]) -> Result<Vec<u8>, VoiceError> {
        let dir = self
            .scratch_dir("sage-tts-")
            .map_err(|e| VoiceError::Normalization(e.to_string()))?;
        let source = dir.path().join("reply.mp3");
        let target = dir
            .path()
            .join(format!("reply.{}", self.reply_format.extension()));

        tokio::fs::write(&source, mp3)
            .await
            .map_err(|e| VoiceError::Normalization(e.to_string()))?;
        self.normalizer.convert(&source, &target).await?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| VoiceError::Normalization(e.to_string()))
    }

    /// The voice catalogue, fetched once per bridge and then served from memory.
    pub async fn list_voices(&self) -> Result<Vec<VoiceDescriptor>, VoiceError> {
        let all = self
            .voices
            .get_or_try_init(|| async {
                let voices = tokio::time::timeout(self.timeout, self.api.list_voices())
                    .await
                    .map_err(|_| VoiceError::Catalogue(format!("timed out after {:?}", self.timeout)))?
                    .map_err(|e| VoiceError::Catalogue(e.to_string()))?;
                info!(count = voices.len(), api = self.api.name(), "Voice catalogue loaded");
                Ok::<_, VoiceError>(voices)
            })
            .await?;

        Ok(all
            .iter()
            .filter(|v| !self.custom_voices_only || is_custom(v))
            .cloned()
            .collect())
    }
}

fn is_custom(voice: &VoiceDescriptor) -> bool {
    CUSTOM_VOICE_CATEGORIES
        .iter()
        .any(|c| voice.category.eq_ignore_ascii_case(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingNormalizer, MockVoiceApi, PassthroughNormalizer};

    fn voice(id: &str, category: &str) -> VoiceDescriptor {
        VoiceDescriptor {
            id: id.to_string(),
            name: id.to_uppercase(),
            category: category.to_string(),
        }
    }

    fn bridge(api: Arc<MockVoiceApi>, root: &std::path::Path) -> SpeechBridge {
        SpeechBridge::new(
            api,
            Arc::new(PassthroughNormalizer),
            "default-voice",
            Duration::from_secs(5),
        )
        .with_temp_root(root)
    }

    fn is_empty_dir(path: &std::path::Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_transcribe_success_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("  what is machine learning  "));
        let text = bridge(api.clone(), root.path())
            .transcribe(b"OggS....", AudioFormat::Ogg)
            .await
            .unwrap();
        assert_eq!(text, "what is machine learning");
        assert_eq!(api.transcribe_calls(), 1);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_transcribe_empty_audio() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("x"));
        let err = bridge(api.clone(), root.path())
            .transcribe(b"", AudioFormat::Ogg)
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::Transcription(_)));
        assert_eq!(api.transcribe_calls(), 0);
    }

    #[tokio::test]
    async fn test_transcribe_normalization_failure_is_distinct() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("x"));
        let bridge = SpeechBridge::new(
            api.clone(),
            Arc::new(FailingNormalizer),
            "v",
            Duration::from_secs(5),
        )
        .with_temp_root(root.path());

        let err = bridge.transcribe(b"data", AudioFormat::Ogg).await.unwrap_err();
        assert!(matches!(err, VoiceError::Normalization(_)));
        assert_eq!(api.transcribe_calls(), 0);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_transcribe_remote_failure() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("x"));
        api.set_fail_transcribe(true);
        let err = bridge(api, root.path())
            .transcribe(b"data", AudioFormat::Ogg)
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::Transcription(ref m) if m.contains("503")));
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_blank_transcript_is_error() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("   "));
        let err = bridge(api, root.path())
            .transcribe(b"data", AudioFormat::Wav)
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::Transcription(_)));
    }

    #[tokio::test]
    async fn test_transcribe_timeout() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("late").with_delay(Duration::from_secs(60)));
        let bridge = SpeechBridge::new(
            api,
            Arc::new(PassthroughNormalizer),
            "v",
            Duration::from_millis(200),
        )
        .with_temp_root(root.path());
        let err = bridge.transcribe(b"data", AudioFormat::Ogg).await.unwrap_err();
        assert!(matches!(err, VoiceError::Transcription(ref m) if m.contains("timed out")));
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_cancelled_transcribe_releases_temp_files() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("late").with_delay(Duration::from_secs(60)));
        let bridge = bridge(api.clone(), root.path());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            bridge.transcribe(b"data", AudioFormat::Ogg),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(api.transcribe_calls(), 1);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_synthesize_default_voice() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new(""));
        let audio = bridge(api, root.path()).synthesize("Hello", None).await.unwrap();
        assert_eq!(audio.format, AudioFormat::Mp3);
        assert_eq!(audio.bytes, b"MP3:default-voice:Hello".to_vec());
    }

    #[tokio::test]
    async fn test_synthesize_voice_override() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new(""));
        let audio = bridge(api, root.path())
            .synthesize("Hi", Some("custom-1"))
            .await
            .unwrap();
        assert_eq!(audio.bytes, b"MP3:custom-1:Hi".to_vec());
    }

    #[tokio::test]
    async fn test_synthesize_failure() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new(""));
        api.set_fail_synthesize(true);
        let err = bridge(api, root.path())
            .synthesize("Hello", Some("bogus"))
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::Synthesis(ref m) if m.contains("bogus")));
    }

    #[tokio::test]
    async fn test_synthesize_rejects_empty_input() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new(""));
        let b = bridge(api.clone(), root.path());
        assert!(matches!(
            b.synthesize("  ", None).await.unwrap_err(),
            VoiceError::Synthesis(_)
        ));
        assert!(matches!(
            b.synthesize("hi", Some(" ")).await.unwrap_err(),
            VoiceError::Synthesis(_)
        ));
        assert_eq!(api.synthesize_calls(), 0);
    }

    #[tokio::test]
    async fn test_synthesize_timeout() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("").with_delay(Duration::from_secs(60)));
        let bridge = SpeechBridge::new(
            api.clone(),
            Arc::new(PassthroughNormalizer),
            "v",
            Duration::from_millis(100),
        )
        .with_reply_format(AudioFormat::Ogg)
        .with_temp_root(root.path());
        let err = bridge.synthesize("Hello", None).await.unwrap_err();
        assert!(matches!(err, VoiceError::Synthesis(ref m) if m.contains("timed out")));
        assert_eq!(api.synthesize_calls(), 1);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_synthesize_ogg_reply_converts_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new(""));
        let audio = bridge(api, root.path())
            .with_reply_format(AudioFormat::Ogg)
            .synthesize("Hello", None)
            .await
            .unwrap();
        assert_eq!(audio.format, AudioFormat::Ogg);
        assert_eq!(audio.bytes, b"MP3:default-voice:Hello".to_vec());
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_synthesize_conversion_failure_is_synthesis_error() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new(""));
        let bridge = SpeechBridge::new(
            api,
            Arc::new(FailingNormalizer),
            "v",
            Duration::from_secs(5),
        )
        .with_reply_format(AudioFormat::Ogg)
        .with_temp_root(root.path());
        let err = bridge.synthesize("Hello", None).await.unwrap_err();
        assert!(matches!(err, VoiceError::Synthesis(_)));
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_list_voices_cached() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(
            MockVoiceApi::new("").with_voices(vec![voice("a", "premade"), voice("b", "cloned")]),
        );
        let b = bridge(api.clone(), root.path());
        assert_eq!(b.list_voices().await.unwrap().len(), 2);
        assert_eq!(b.list_voices().await.unwrap().len(), 2);
        assert_eq!(api.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_voices_timeout_not_cached() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(
            MockVoiceApi::new("")
                .with_voices(vec![voice("a", "premade")])
                .with_delay(Duration::from_secs(60)),
        );
        let bridge = SpeechBridge::new(
            api.clone(),
            Arc::new(PassthroughNormalizer),
            "v",
            Duration::from_millis(100),
        )
        .with_temp_root(root.path());

        let first = bridge.list_voices().await.unwrap_err();
        assert!(matches!(first, VoiceError::Catalogue(ref m) if m.contains("timed out")));
        let second = bridge.list_voices().await.unwrap_err();
        assert!(matches!(second, VoiceError::Catalogue(_)));
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_list_voices_custom_filter() {
        let root = tempfile::tempdir().unwrap();
        let api = Arc::new(MockVoiceApi::new("").with_voices(vec![
            voice("a", "premade"),
            voice("b", "cloned"),
            voice("c", "generated"),
            voice("d", "Custom"),
        ]));
        let b = bridge(api, root.path()).with_custom_voices_only(true);
        let ids: Vec<String> = b.list_voices().await.unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_from_config_rejects_bad_reply_format() {
        let config = VoiceConfig {
            reply_format: "aiff".to_string(),
            ..VoiceConfig::default()
        };
        let result = SpeechBridge::from_config(
            Arc::new(MockVoiceApi::new("")),
            Arc::new(PassthroughNormalizer),
            &config,
        );
        assert!(result.is_err());
    }
}
