//! Pipeline orchestrator: central coordinator for one user message.
//!
//! Drives a request through transcription, grounding, completion,
//! persistence and synthesis. Transcription and completion are mandatory
//! and abort the run with an apology; history access, knowledge search and
//! reply synthesis are best effort and only add warnings.

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use sage_core::config::SageConfig;
use sage_core::error::SageError;
use sage_core::types::NewHistoryRecord;
use sage_llm::{CompletionClient, CompletionOptions, CompletionRequest, Turn};
use sage_storage::{HistoryLog, KnowledgeStore};
use sage_voice::{AudioFormat, SpeechBridge, SynthesizedAudio, VoiceError};

use crate::apology::apology_for;
use crate::context::ContextAssembler;
use crate::error::PipelineError;
use crate::state_machine::validate_transition;
use crate::types::{
    PipelineInput, PipelineRequest, PipelineResult, PipelineStage, PipelineState, StageFailure,
    StageWarning,
};

/// Maximum text message length in characters.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Default number of prior exchanges handed to the model.
const DEFAULT_HINT_TURNS: usize = 3;

pub struct PipelineOrchestrator {
    assembler: ContextAssembler,
    completion: CompletionClient,
    history: Arc<dyn HistoryLog>,
    speech: Option<Arc<SpeechBridge>>,
    system_prompt: String,
    options: CompletionOptions,
    hint_turns: usize,
}

/// Bookkeeping for one invocation.
struct Run {
    state: PipelineState,
    trace: Vec<PipelineState>,
    warnings: Vec<StageWarning>,
    transcript: Option<String>,
    matched_ids: Vec<i64>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: PipelineState::Received,
            trace: vec![PipelineState::Received],
            warnings: Vec::new(),
            transcript: None,
            matched_ids: Vec::new(),
        }
    }

    fn advance(&mut self, to: PipelineState) -> Result<(), StageFailure> {
        validate_transition(self.state, to).map_err(|e| {
            StageFailure::from_error(PipelineStage::Orchestration, &SageError::from(e))
        })?;
        debug!(from = %self.state, to = %to, "Pipeline transition");
        self.state = to;
        self.trace.push(to);
        Ok(())
    }

    fn fail(&mut self, stage: PipelineStage) {
        let to = PipelineState::Failed(stage);
        if validate_transition(self.state, to).is_ok() {
            self.state = to;
            self.trace.push(to);
        }
    }

    fn degrade(&mut self, stage: PipelineStage, err: &SageError) {
        warn!(stage = %stage, kind = %err.kind(), error = %err, "Pipeline step degraded");
        self.warnings.push(StageWarning::from_error(stage, err));
    }
}

/// What a successful run hands back before it is folded into a result.
struct Reply {
    text: String,
    audio: Option<SynthesizedAudio>,
    history_id: Option<i64>,
}

impl PipelineOrchestrator {
    pub fn new(
        assembler: ContextAssembler,
        completion: CompletionClient,
        history: Arc<dyn HistoryLog>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            assembler,
            completion,
            history,
            speech: None,
            system_prompt: system_prompt.into(),
            options: CompletionOptions::default(),
            hint_turns: DEFAULT_HINT_TURNS,
        }
    }

    /// Wire an orchestrator from the loaded configuration.
    pub fn from_config(
        knowledge: Arc<dyn KnowledgeStore>,
        history: Arc<dyn HistoryLog>,
        completion: CompletionClient,
        config: &SageConfig,
    ) -> Self {
        Self::new(
            ContextAssembler::from_config(knowledge, &config.knowledge),
            completion,
            history,
            config.completion.system_prompt.clone(),
        )
        .with_options(CompletionOptions::from(&config.completion))
        .with_hint_turns(config.history.hint_turns)
    }

    /// Enable voice input and voice replies.
    pub fn with_speech(mut self, speech: Arc<SpeechBridge>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of prior exchanges passed to the model. Zero disables the hint.
    pub fn with_hint_turns(mut self, turns: usize) -> Self {
        self.hint_turns = turns;
        self
    }

    pub fn speech(&self) -> Option<&Arc<SpeechBridge>> {
        self.speech.as_ref()
    }

    /// Answer one user message.
    ///
    /// Never returns an error: hard failures produce a result carrying an
    /// apology and the failure, soft failures produce warnings. Dropping the
    /// returned future abandons in-flight remote calls, removes temporary
    /// audio files and writes no history record unless persistence had
    /// already completed.
    pub async fn process(&self, request: PipelineRequest) -> PipelineResult {
        let request_id = Uuid::new_v4();
        let span = info_span!("pipeline", request_id = %request_id, user_id = request.user_id);
        self.run(request_id, request).instrument(span).await
    }

    async fn run(&self, request_id: Uuid, request: PipelineRequest) -> PipelineResult {
        let mut run = Run::new();
        let outcome = self.execute(&mut run, &request).await;

        let (reply, failure) = match outcome {
            Ok(reply) => {
                info!(
                    warnings = run.warnings.len(),
                    matched = run.matched_ids.len(),
                    voice_reply = reply.audio.is_some(),
                    "Pipeline done"
                );
                (reply, None)
            }
            Err(failure) => {
                error!(
                    stage = %failure.stage,
                    kind = %failure.kind,
                    error = %failure.message,
                    "Pipeline failed"
                );
                run.fail(failure.stage);
                let reply = Reply {
                    text: apology_for(failure.kind).to_string(),
                    audio: None,
                    history_id: None,
                };
                (reply, Some(failure))
            }
        };

        PipelineResult {
            request_id,
            response_text: reply.text,
            response_audio: reply.audio,
            matched_knowledge_ids: run.matched_ids,
            transcript: run.transcript,
            history_id: reply.history_id,
            failure,
            warnings: run.warnings,
            trace: run.trace,
        }
    }

    async fn execute(&self, run: &mut Run, request: &PipelineRequest) -> Result<Reply, StageFailure> {
        // Input
        let message = match &request.input {
            PipelineInput::Text(text) => validate_text(text)?,
            PipelineInput::Voice { audio, format } => {
                let transcript = self.transcribe(audio, format).await?;
                info!(chars = transcript.chars().count(), "Voice message transcribed");
                let text = validate_text(&transcript)?;
                run.transcript = Some(transcript);
                run.advance(PipelineState::Transcribed)?;
                text
            }
        };

        // Context
        let hint = self.conversation_hint(run, request.user_id);
        let context = self.assembler.build_context(&message);
        if let Some(e) = &context.search_error {
            run.degrade(PipelineStage::Context, &SageError::Storage(e.clone()));
        }
        run.matched_ids = context.matched_ids.clone();
        run.advance(PipelineState::ContextBuilt)?;

        // Completion
        let completion_request = CompletionRequest::new(self.system_prompt.clone(), message.clone())
            .with_context(context.block)
            .with_hint(hint)
            .with_options(self.options);
        let response = self
            .completion
            .complete(&completion_request)
            .await
            .map_err(|e| StageFailure::from_error(PipelineStage::Completion, &SageError::from(e)))?;
        run.advance(PipelineState::Completed)?;

        // Persistence
        let record = NewHistoryRecord {
            user_id: request.user_id,
            message,
            response: response.clone(),
        };
        let history_id = match self.history.append(record) {
            Ok(record) => Some(record.id),
            Err(e) => {
                run.degrade(PipelineStage::Persistence, &e);
                None
            }
        };
        run.advance(PipelineState::Persisted)?;

        // Synthesis
        let mut audio = None;
        if request.wants_voice_reply {
            match self.synthesize(&response, request.voice_id.as_deref()).await {
                Ok(synthesized) => {
                    audio = Some(synthesized);
                    run.advance(PipelineState::Synthesized)?;
                }
                Err(e) => run.degrade(PipelineStage::Synthesis, &e),
            }
        }

        run.advance(PipelineState::Done)?;
        Ok(Reply {
            text: response,
            audio,
            history_id,
        })
    }

    async fn transcribe(&self, audio: &[u8], format: &str) -> Result<String, StageFailure> {
        let stage = PipelineStage::Transcription;
        let speech = self.speech.as_ref().ok_or_else(|| {
            StageFailure::from_error(
                stage,
                &SageError::Transcription("voice input is not configured".to_string()),
            )
        })?;
        let format: AudioFormat = format
            .parse()
            .map_err(|e: VoiceError| StageFailure::from_error(stage, &SageError::from(e)))?;
        speech
            .transcribe(audio, format)
            .await
            .map_err(|e| StageFailure::from_error(stage, &SageError::from(e)))
    }

    /// Prior exchanges for the prompt, oldest first.
    fn conversation_hint(&self, run: &mut Run, user_id: i64) -> Vec<Turn> {
        if self.hint_turns == 0 {
            return Vec::new();
        }
        match self.history.recent(user_id, self.hint_turns) {
            Ok(records) => records
                .into_iter()
                .rev()
                .map(|r| Turn {
                    user: r.message,
                    assistant: r.response,
                })
                .collect(),
            Err(e) => {
                run.degrade(PipelineStage::Context, &e);
                Vec::new()
            }
        }
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
    ) -> Result<SynthesizedAudio, SageError> {
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| SageError::Synthesis("voice replies are not configured".to_string()))?;
        Ok(speech.synthesize(text, voice_id).await?)
    }
}

fn validate_text(text: &str) -> Result<String, StageFailure> {
    let text = text.trim();
    let invalid = if text.is_empty() {
        Some("message must not be empty".to_string())
    } else if text.chars().count() > MAX_MESSAGE_CHARS {
        Some(format!("message exceeds {} characters", MAX_MESSAGE_CHARS))
    } else {
        None
    };
    match invalid {
        Some(reason) => Err(StageFailure::from_error(
            PipelineStage::Input,
            &SageError::from(PipelineError::InvalidRequest(reason)),
        )),
        None => Ok(text.to_string()),
    }
}
