use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SageError};

/// Default system prompt given to the language model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant with expertise in artificial intelligence. You have access to a knowledge database about AI topics.

When answering questions:
1. Use the provided knowledge base information when relevant
2. Provide accurate, helpful, and informative responses
3. If the knowledge base doesn't contain relevant information, use your general AI knowledge
4. Keep responses concise but comprehensive
5. Be conversational and friendly

Always cite sources when possible and acknowledge when information comes from the knowledge base.";

/// Top-level configuration for the Sage assistant.
///
/// Loaded from `~/.sage/config.toml` by default. API keys are never read
/// from this file; the binary takes them from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SageConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl SageConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SageConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let c = &self.completion;
        if c.model.trim().is_empty() {
            return Err(SageError::Config("completion.model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(SageError::Config(
                "completion.max_tokens must be greater than 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(SageError::Config(format!(
                "completion.temperature must be within 0.0..=2.0, got {}",
                c.temperature
            )));
        }
        if c.timeout_secs == 0 || self.voice.timeout_secs == 0 {
            return Err(SageError::Config("timeouts must be greater than 0".into()));
        }
        if self.knowledge.context_limit == 0 {
            return Err(SageError::Config(
                "knowledge.context_limit must be greater than 0".into(),
            ));
        }
        if self.voice.default_voice_id.trim().is_empty() {
            return Err(SageError::Config(
                "voice.default_voice_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Absolute path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        resolve_data_dir(&self.general.data_dir).join(&self.storage.database_file)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.sage/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name inside `general.data_dir`.
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "sage.db".to_string(),
        }
    }
}

/// Language-model completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,
    /// Model identifier.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on a single completion call.
    pub timeout_secs: u64,
    /// Fixed delay before the single rate-limit retry.
    pub retry_delay_ms: u64,
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 60,
            retry_delay_ms: 1000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Knowledge grounding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Maximum number of entries matched into one prompt.
    pub context_limit: usize,
    /// Maximum length of the context block, in characters.
    pub max_context_chars: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            context_limit: 3,
            max_context_chars: 4000,
        }
    }
}

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of recent exchanges passed to the model as a conversation hint.
    pub hint_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { hint_turns: 3 }
    }
}

/// Voice round-trip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Base URL of the voice API.
    pub api_base: String,
    pub default_voice_id: String,
    /// Text-to-speech model.
    pub tts_model: String,
    /// Speech-to-text model.
    pub transcription_model: String,
    /// Upper bound on a single voice API call (and on audio conversion).
    pub timeout_secs: u64,
    /// ffmpeg binary used to normalize audio.
    pub ffmpeg_path: String,
    /// Only list cloned, generated and custom voices.
    pub custom_voices_only: bool,
    /// Container of synthesized replies: "mp3" or "ogg".
    pub reply_format: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.elevenlabs.io".to_string(),
            default_voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            tts_model: "eleven_monolingual_v1".to_string(),
            transcription_model: "scribe_v1".to_string(),
            timeout_secs: 30,
            ffmpeg_path: "ffmpeg".to_string(),
            custom_voices_only: false,
            reply_format: "mp3".to_string(),
        }
    }
}
