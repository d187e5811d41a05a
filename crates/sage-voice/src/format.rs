use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

/// Audio containers the bridge accepts or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Ogg,
    Mp3,
    Wav,
    M4a,
    Webm,
    Flac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
            AudioFormat::Webm => "webm",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Flac => "audio/flac",
        }
    }

    /// Guess the format from a file name's extension.
    pub fn from_path(path: &std::path::Path) -> Result<Self, VoiceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| VoiceError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for AudioFormat {
    type Err = VoiceError;

    /// Accepts extensions and common MIME types, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().trim_start_matches('.').to_ascii_lowercase();
        let name = lower.strip_prefix("audio/").unwrap_or(&lower);
        match name {
            "ogg" | "oga" | "opus" => Ok(AudioFormat::Ogg),
            "mp3" | "mpeg" => Ok(AudioFormat::Mp3),
            "wav" | "wave" | "x-wav" => Ok(AudioFormat::Wav),
            "m4a" | "mp4" | "aac" => Ok(AudioFormat::M4a),
            "webm" => Ok(AudioFormat::Webm),
            "flac" => Ok(AudioFormat::Flac),
            _ => Err(VoiceError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
