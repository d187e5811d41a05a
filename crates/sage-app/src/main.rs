//! Sage application binary - composition root.
//!
//! Ties together all Sage crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Open the SQLite database (knowledge + history)
//! 3. Build the completion client (OpenAI-compatible, or the offline canned
//!    responder when no key is set)
//! 4. Build the speech bridge when a voice API key is set
//! 5. Run one command through the pipeline or against the stores

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sage_chat::{PipelineOrchestrator, PipelineRequest, PipelineResult};
use sage_core::config::SageConfig;
use sage_core::types::NewKnowledgeEntry;
use sage_llm::{CannedResponder, CompletionBackend, CompletionClient, OpenAiBackend};
use sage_storage::{
    seed_if_empty, Database, HistoryLog, KnowledgeStore, SqliteHistoryLog, SqliteKnowledgeStore,
};
use sage_voice::{AudioFormat, ElevenLabsApi, FfmpegNormalizer, SpeechBridge};

use cli::{CliArgs, Command};

const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
const ELEVENLABS_KEY_VAR: &str = "ELEVENLABS_API_KEY";

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Read a non-empty secret from the environment.
fn secret(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn completion_backend(config: &SageConfig) -> AppResult<Arc<dyn CompletionBackend>> {
    match secret(OPENAI_KEY_VAR) {
        Some(key) => {
            let backend = OpenAiBackend::new(&config.completion, key)?;
            tracing::info!(model = backend.model(), "Completion endpoint configured");
            Ok(Arc::new(backend))
        }
        None => {
            tracing::warn!(
                "{} not set, answering with the offline canned responder",
                OPENAI_KEY_VAR
            );
            Ok(Arc::new(CannedResponder::new()))
        }
    }
}

fn speech_bridge(config: &SageConfig, custom_only: bool) -> AppResult<Option<Arc<SpeechBridge>>> {
    let Some(key) = secret(ELEVENLABS_KEY_VAR) else {
        tracing::info!("{} not set, voice features disabled", ELEVENLABS_KEY_VAR);
        return Ok(None);
    };
    let voice = &config.voice;
    let api = ElevenLabsApi::new(voice, key)?;
    let normalizer = FfmpegNormalizer::new(&voice.ffmpeg_path, Duration::from_secs(voice.timeout_secs));
    let bridge = SpeechBridge::from_config(Arc::new(api), Arc::new(normalizer), voice)?
        .with_custom_voices_only(voice.custom_voices_only || custom_only);
    tracing::info!(
        default_voice = bridge.default_voice_id(),
        reply_format = %bridge.reply_format(),
        "Speech bridge ready"
    );
    Ok(Some(Arc::new(bridge)))
}

fn print_result(result: &PipelineResult) {
    if let Some(ref transcript) = result.transcript {
        println!("You said: {}", transcript);
        println!();
    }
    println!("{}", result.response_text);
    for warning in &result.warnings {
        eprintln!("warning: {} degraded ({}): {}", warning.stage, warning.kind, warning.message);
    }
    if let Some(ref failure) = result.failure {
        eprintln!("error: {}", failure);
    }
}

async fn write_audio(result: &PipelineResult, target: Option<&Path>) -> AppResult<()> {
    let (Some(target), Some(audio)) = (target, result.response_audio.as_ref()) else {
        return Ok(());
    };
    tokio::fs::write(target, &audio.bytes).await?;
    println!("Voice reply ({}) written to {}", audio.format, target.display());
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = SageConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    // Tracing.
    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting Sage v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(path = %config_file.display(), "Configuration resolved");

    if args.command == Command::Config {
        println!("# {}\n{}", config_file.display(), config.to_toml()?);
        return Ok(());
    }

    // Storage.
    let db_path = config.database_path();
    let db = Arc::new(Database::new(&db_path)?);
    tracing::debug!(location = db.location(), "SQLite database opened");
    let knowledge: Arc<dyn KnowledgeStore> = Arc::new(SqliteKnowledgeStore::new(Arc::clone(&db)));
    let history: Arc<dyn HistoryLog> = Arc::new(SqliteHistoryLog::new(Arc::clone(&db)));

    match args.command {
        Command::Ask {
            user,
            speak_to,
            voice,
            message,
        } => {
            let orchestrator = build_orchestrator(&config, knowledge, history)?;
            let mut request = PipelineRequest::text(user, message.join(" "));
            if speak_to.is_some() {
                request = request.with_voice_reply();
            }
            if let Some(voice) = voice {
                request = request.with_voice_id(voice);
            }
            let result = orchestrator.process(request).await;
            print_result(&result);
            write_audio(&result, speak_to.as_deref()).await?;
        }
        Command::AskVoice {
            user,
            format,
            speak_to,
            voice,
            file,
        } => {
            let orchestrator = build_orchestrator(&config, knowledge, history)?;
            let format = match format {
                Some(f) => f,
                None => AudioFormat::from_path(&file)?.extension().to_string(),
            };
            let audio = tokio::fs::read(&file).await?;
            let mut request = PipelineRequest::voice(user, audio, format);
            if speak_to.is_some() {
                request = request.with_voice_reply();
            }
            if let Some(voice) = voice {
                request = request.with_voice_id(voice);
            }
            let result = orchestrator.process(request).await;
            print_result(&result);
            write_audio(&result, speak_to.as_deref()).await?;
        }
        Command::Search { limit, json, query } => {
            let entries = knowledge.search(&query.join(" "), limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No matching knowledge.");
            } else {
                for entry in entries {
                    println!(
                        "[{}] {} ({})",
                        entry.id,
                        entry.title,
                        entry.category.as_deref().unwrap_or("uncategorized")
                    );
                }
            }
        }
        Command::History { user, limit } => {
            let records = history.recent(user, limit)?;
            if records.is_empty() {
                println!("No conversation history for user {}.", user);
            }
            for record in records {
                println!("[{}] {}", record.timestamp.format("%Y-%m-%d %H:%M:%S"), record.message);
                println!("  -> {}", record.response);
            }
        }
        Command::Add {
            title,
            content,
            category,
            tags,
        } => {
            let mut entry = NewKnowledgeEntry::new(title, content).with_tags(tags);
            if let Some(category) = category {
                entry = entry.with_category(category);
            }
            let stored = knowledge.add(entry)?;
            println!("Added knowledge entry {}: {}", stored.id, stored.title);
        }
        Command::Categories => {
            let categories = knowledge.categories()?;
            if categories.is_empty() {
                println!("No categories yet.");
            }
            for (name, count) in categories {
                println!("{:<32} {}", name, count);
            }
        }
        Command::Seed => {
            let added = seed_if_empty(knowledge.as_ref())?;
            if added == 0 {
                println!("Knowledge base already has {} entries, nothing seeded.", knowledge.count()?);
            } else {
                println!("Seeded {} sample entries.", added);
            }
        }
        Command::Voices { custom } => {
            let Some(bridge) = speech_bridge(&config, custom)? else {
                return Err(format!("set {} to list voices", ELEVENLABS_KEY_VAR).into());
            };
            let voices = bridge.list_voices().await?;
            if voices.is_empty() {
                println!("No voices available.");
            }
            for voice in voices {
                let marker = if voice.id == bridge.default_voice_id() { "*" } else { " " };
                println!("{} {:<24} {:<12} {}", marker, voice.name, voice.category, voice.id);
            }
        }
        Command::Config => {}
    }

    Ok(())
}

fn build_orchestrator(
    config: &SageConfig,
    knowledge: Arc<dyn KnowledgeStore>,
    history: Arc<dyn HistoryLog>,
) -> AppResult<PipelineOrchestrator> {
    let client = CompletionClient::from_config(completion_backend(config)?, &config.completion);
    let mut orchestrator = PipelineOrchestrator::from_config(knowledge, history, client, config);
    if let Some(bridge) = speech_bridge(config, false)? {
        orchestrator = orchestrator.with_speech(bridge);
    }
    Ok(orchestrator)
}

