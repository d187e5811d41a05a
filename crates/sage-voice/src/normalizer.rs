//! Audio container conversion.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::VoiceError;
use crate::format::AudioFormat;

/// Converts an audio file into the container implied by the output path.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), VoiceError>;
}

/// Runs the `ffmpeg` binary.
///
/// The child process is killed if the conversion future is dropped.
pub struct FfmpegNormalizer {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegNormalizer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Codec arguments for the target container.
    fn codec_args(output: &Path) -> Result<&'static [&'static str], VoiceError> {
        let args: &'static [&'static str] = match AudioFormat::from_path(output)? {
            AudioFormat::Wav => &["-acodec", "pcm_s16le", "-ar", "44100", "-ac", "2"],
            AudioFormat::Ogg => &["-c:a", "libopus"],
            AudioFormat::Mp3 => &["-c:a", "libmp3lame"],
            AudioFormat::M4a => &["-c:a", "aac"],
            AudioFormat::Webm => &["-c:a", "libopus"],
            AudioFormat::Flac => &["-c:a", "flac"],
        };
        Ok(args)
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), VoiceError> {
        let codec = Self::codec_args(output)
            .map_err(|e| VoiceError::Normalization(e.to_string()))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(codec)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program.display(), input = %input.display(), output = %output.display(), "Running audio conversion");

        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                VoiceError::Normalization(format!("conversion timed out after {:?}", self.timeout))
            })?
            .map_err(|e| {
                VoiceError::Normalization(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(VoiceError::Normalization(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
