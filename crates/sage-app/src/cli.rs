//! CLI argument definitions for the Sage application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sage — a knowledge-grounded AI assistant with voice replies.
#[derive(Parser, Debug)]
#[command(name = "sage", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Ask a question in text.
    Ask {
        /// Conversation owner.
        #[arg(short = 'u', long = "user", default_value_t = 0)]
        user: i64,
        /// Also synthesize the answer and write the audio here.
        #[arg(long = "speak-to")]
        speak_to: Option<PathBuf>,
        /// Voice used for the spoken answer.
        #[arg(long = "voice")]
        voice: Option<String>,
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Ask a question with a recorded voice clip.
    AskVoice {
        #[arg(short = 'u', long = "user", default_value_t = 0)]
        user: i64,
        /// Source format; taken from the file extension when omitted.
        #[arg(long = "format")]
        format: Option<String>,
        #[arg(long = "speak-to")]
        speak_to: Option<PathBuf>,
        #[arg(long = "voice")]
        voice: Option<String>,
        file: PathBuf,
    },
    /// Search the knowledge base.
    Search {
        #[arg(short = 'n', long = "limit", default_value_t = 5)]
        limit: usize,
        /// Print entries as JSON.
        #[arg(long = "json")]
        json: bool,
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show recent exchanges for a user, newest first.
    History {
        #[arg(short = 'u', long = "user", default_value_t = 0)]
        user: i64,
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        limit: usize,
    },
    /// Add a knowledge entry.
    Add {
        #[arg(long = "title")]
        title: String,
        #[arg(long = "content")]
        content: String,
        #[arg(long = "category")]
        category: Option<String>,
        /// Repeat for several tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List knowledge categories with entry counts.
    Categories,
    /// Load the sample AI knowledge base into an empty database.
    Seed,
    /// List synthesis voices.
    Voices {
        /// Only cloned, generated and custom voices.
        #[arg(long = "custom")]
        custom: bool,
    },
    /// Print the resolved configuration.
    Config,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > SAGE_CONFIG env var > platform default (~/.sage/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("SAGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Priority: --data-dir flag > config file value.
    /// Returns `None` if not overridden (use config default).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log filter.
    ///
    /// Priority: --log-level flag > RUST_LOG > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        match std::env::var("RUST_LOG") {
            Ok(filter) if !filter.trim().is_empty() => filter,
            _ => config_level.to_string(),
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".sage").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".sage").join("config.toml");
    }
    PathBuf::from("config.toml")
}
