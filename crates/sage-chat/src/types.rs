use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sage_core::error::{ErrorKind, SageError};
use sage_voice::SynthesizedAudio;

// =============================================================================
// Stages and states
// =============================================================================

/// The pipeline step a failure or warning is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Input,
    Transcription,
    Context,
    Completion,
    Persistence,
    Synthesis,
    /// The orchestrator's own bookkeeping.
    Orchestration,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Input => "input",
            PipelineStage::Transcription => "transcription",
            PipelineStage::Context => "context",
            PipelineStage::Completion => "completion",
            PipelineStage::Persistence => "persistence",
            PipelineStage::Synthesis => "synthesis",
            PipelineStage::Orchestration => "orchestration",
        };
        f.write_str(s)
    }
}

/// Where a single invocation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Transcribed,
    ContextBuilt,
    Completed,
    Persisted,
    Synthesized,
    Done,
    Failed(PipelineStage),
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Received => f.write_str("received"),
            PipelineState::Transcribed => f.write_str("transcribed"),
            PipelineState::ContextBuilt => f.write_str("context_built"),
            PipelineState::Completed => f.write_str("completed"),
            PipelineState::Persisted => f.write_str("persisted"),
            PipelineState::Synthesized => f.write_str("synthesized"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

// =============================================================================
// Request
// =============================================================================

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineInput {
    Text(String),
    /// Raw audio plus the source format as declared by the message source
    /// (an extension or MIME type such as `"ogg"` or `"audio/mpeg"`).
    Voice { audio: Vec<u8>, format: String },
}

/// One user message to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub user_id: i64,
    pub input: PipelineInput,
    pub wants_voice_reply: bool,
    /// Overrides the default synthesis voice.
    pub voice_id: Option<String>,
}

impl PipelineRequest {
    pub fn text(user_id: i64, text: impl Into<String>) -> Self {
        Self {
            user_id,
            input: PipelineInput::Text(text.into()),
            wants_voice_reply: false,
            voice_id: None,
        }
    }

    pub fn voice(user_id: i64, audio: Vec<u8>, format: impl Into<String>) -> Self {
        Self {
            user_id,
            input: PipelineInput::Voice {
                audio,
                format: format.into(),
            },
            wants_voice_reply: false,
            voice_id: None,
        }
    }

    pub fn with_voice_reply(mut self) -> Self {
        self.wants_voice_reply = true;
        self
    }

    pub fn with_voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self
    }
}

// =============================================================================
// Result
// =============================================================================

/// A hard failure that aborted the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub kind: ErrorKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: PipelineStage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(stage: PipelineStage, err: &SageError) -> Self {
        Self::new(stage, err.kind(), err.to_string())
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.kind, self.message)
    }
}

/// A best-effort step that degraded without aborting the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageWarning {
    pub stage: PipelineStage,
    pub kind: ErrorKind,
    pub message: String,
}

impl StageWarning {
    pub fn from_error(stage: PipelineStage, err: &SageError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything the caller needs to reply to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub request_id: Uuid,
    /// The answer, or an apology when `failure` is set.
    pub response_text: String,
    pub response_audio: Option<SynthesizedAudio>,
    /// Knowledge entries that went into the prompt, best first.
    pub matched_knowledge_ids: Vec<i64>,
    /// What was heard, for voice input.
    pub transcript: Option<String>,
    /// Id of the persisted exchange, when persistence succeeded.
    pub history_id: Option<i64>,
    pub failure: Option<StageFailure>,
    pub warnings: Vec<StageWarning>,
    /// States visited, in order.
    pub trace: Vec<PipelineState>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Succeeded, but at least one best-effort step was skipped.
    pub fn is_degraded(&self) -> bool {
        self.is_success() && !self.warnings.is_empty()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    pub fn warning_for(&self, stage: PipelineStage) -> Option<&StageWarning> {
        self.warnings.iter().find(|w| w.stage == stage)
    }

    pub fn final_state(&self) -> Option<PipelineState> {
        self.trace.last().copied()
    }
}
