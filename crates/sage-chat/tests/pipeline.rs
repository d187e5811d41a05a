//! End-to-end pipeline runs against in-memory stores and scripted remotes.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use sage_chat::{
    apology_for, ContextAssembler, PipelineOrchestrator, PipelineRequest, PipelineStage,
    PipelineState,
};
use sage_core::error::{ErrorKind, SageError};
use sage_core::types::{HistoryRecord, NewHistoryRecord, NewKnowledgeEntry};
use sage_llm::{CompletionClient, CompletionError, ScriptedBackend};
use sage_storage::{Database, HistoryLog, KnowledgeStore, SqliteHistoryLog, SqliteKnowledgeStore};
use sage_voice::{
    AudioFormat, AudioNormalizer, FailingNormalizer, MockVoiceApi, PassthroughNormalizer,
    SpeechBridge,
};

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    knowledge: Arc<SqliteKnowledgeStore>,
    history: Arc<SqliteHistoryLog>,
    backend: Arc<ScriptedBackend>,
    voice: Arc<MockVoiceApi>,
    temp: TempDir,
}

impl Harness {
    fn new(backend: ScriptedBackend) -> Self {
        Self::with_db(backend, Database::in_memory().unwrap())
    }

    fn with_db(backend: ScriptedBackend, db: Database) -> Self {
        let db = Arc::new(db);
        Self {
            knowledge: Arc::new(SqliteKnowledgeStore::new(db.clone())),
            history: Arc::new(SqliteHistoryLog::new(db)),
            backend: Arc::new(backend),
            voice: Arc::new(MockVoiceApi::new("What is machine learning?")),
            temp: tempfile::tempdir().unwrap(),
        }
    }

    fn client(&self) -> CompletionClient {
        CompletionClient::new(
            self.backend.clone(),
            Duration::from_secs(5),
            Duration::from_millis(10),
        )
    }

    fn bridge(&self, normalizer: Arc<dyn AudioNormalizer>) -> Arc<SpeechBridge> {
        Arc::new(
            SpeechBridge::new(
                self.voice.clone(),
                normalizer,
                "default-voice",
                Duration::from_secs(5),
            )
            .with_temp_root(self.temp.path()),
        )
    }

    fn text_only(&self) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            ContextAssembler::new(self.knowledge.clone(), 3, 4000),
            self.client(),
            self.history.clone(),
            "You are a helpful assistant.",
        )
    }

    fn with_voice(&self) -> PipelineOrchestrator {
        self.text_only()
            .with_speech(self.bridge(Arc::new(PassthroughNormalizer)))
    }

    fn records(&self, user_id: i64) -> Vec<HistoryRecord> {
        self.history.recent(user_id, 100).unwrap()
    }

    fn temp_is_empty(&self) -> bool {
        std::fs::read_dir(self.temp.path()).unwrap().next().is_none()
    }

    fn add_ml_entry(&self) -> i64 {
        self.knowledge
            .add(
                NewKnowledgeEntry::new(
                    "Machine Learning",
                    "Machine learning lets computers learn patterns from data.",
                )
                .with_category("AI Fundamentals")
                .with_tags(["ml", "supervised learning"]),
            )
            .unwrap()
            .id
    }
}

/// History log whose backing store is gone.
struct UnavailableHistory;

impl HistoryLog for UnavailableHistory {
    fn append(&self, _record: NewHistoryRecord) -> Result<HistoryRecord, SageError> {
        Err(SageError::Storage("disk I/O error".into()))
    }

    fn recent(&self, _user_id: i64, _limit: usize) -> Result<Vec<HistoryRecord>, SageError> {
        Err(SageError::Storage("disk I/O error".into()))
    }

    fn count_for_user(&self, _user_id: i64) -> Result<usize, SageError> {
        Err(SageError::Storage("disk I/O error".into()))
    }
}

// =============================================================================
// Text input
// =============================================================================

#[tokio::test]
async fn test_text_success_writes_one_record() {
    let h = Harness::new(ScriptedBackend::replying("Machine learning is learning from data."));
    let result = h
        .text_only()
        .process(PipelineRequest::text(42, "Tell me something"))
        .await;

    assert!(result.is_success());
    assert!(!result.is_degraded());
    assert_eq!(result.response_text, "Machine learning is learning from data.");
    assert!(result.response_audio.is_none());
    assert!(result.transcript.is_none());
    assert_eq!(
        result.trace,
        vec![
            PipelineState::Received,
            PipelineState::ContextBuilt,
            PipelineState::Completed,
            PipelineState::Persisted,
            PipelineState::Done,
        ]
    );

    let records = h.records(42);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "Tell me something");
    assert_eq!(records[0].response, result.response_text);
    assert_eq!(result.history_id, Some(records[0].id));
}

#[tokio::test]
async fn test_matching_knowledge_grounds_prompt() {
    let h = Harness::new(ScriptedBackend::replying("ML is a branch of AI."));
    let id = h.add_ml_entry();

    let result = h
        .text_only()
        .process(PipelineRequest::text(1, "What is machine learning?"))
        .await;

    assert!(result.is_success());
    assert_eq!(result.matched_knowledge_ids, vec![id]);
    let sent = &h.backend.requests()[0];
    assert!(sent
        .context_block
        .contains("Machine learning lets computers learn patterns from data."));
    assert!(sent.user_prompt().starts_with("Context from knowledge base:\n"));
    assert_eq!(sent.system_prompt, "You are a helpful assistant.");
}

#[tokio::test]
async fn test_no_match_still_answers() {
    let h = Harness::new(ScriptedBackend::replying("I don't have notes on that, but..."));
    h.add_ml_entry();

    let result = h
        .text_only()
        .process(PipelineRequest::text(1, "quantum computing"))
        .await;

    assert!(result.is_success());
    assert!(result.matched_knowledge_ids.is_empty());
    assert_eq!(h.backend.calls(), 1);
    let sent = &h.backend.requests()[0];
    assert!(sent.context_block.is_empty());
    assert_eq!(sent.user_prompt(), "User question: quantum computing");
    assert_eq!(h.records(1).len(), 1);
}

#[tokio::test]
async fn test_blank_text_rejected_before_completion() {
    let h = Harness::new(ScriptedBackend::replying("unused"));
    let result = h.text_only().process(PipelineRequest::text(1, "   ")).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
    assert_eq!(result.failure.as_ref().unwrap().stage, PipelineStage::Input);
    assert_eq!(result.response_text, apology_for(ErrorKind::Validation));
    assert_eq!(
        result.final_state(),
        Some(PipelineState::Failed(PipelineStage::Input))
    );
    assert_eq!(h.backend.calls(), 0);
    assert!(h.records(1).is_empty());
}

#[tokio::test]
async fn test_conversation_hint_oldest_first() {
    let h = Harness::new(
        ScriptedBackend::replying("third answer")
            .then(Ok("first answer".into()))
            .then(Ok("second answer".into())),
    );
    let orchestrator = h.text_only();
    orchestrator.process(PipelineRequest::text(5, "first")).await;
    orchestrator.process(PipelineRequest::text(5, "second")).await;
    orchestrator.process(PipelineRequest::text(6, "other user")).await;
    orchestrator.process(PipelineRequest::text(5, "third")).await;

    let requests = h.backend.requests();
    assert!(requests[0].conversation_hint.is_empty());
    let hint = &requests[3].conversation_hint;
    assert_eq!(hint.len(), 2);
    assert_eq!(hint[0].user, "first");
    assert_eq!(hint[0].assistant, "first answer");
    assert_eq!(hint[1].user, "second");
}

#[tokio::test]
async fn test_hint_disabled() {
    let h = Harness::new(ScriptedBackend::replying("ok"));
    let orchestrator = h.text_only().with_hint_turns(0);
    orchestrator.process(PipelineRequest::text(5, "first")).await;
    orchestrator.process(PipelineRequest::text(5, "second")).await;
    assert!(h.backend.requests()[1].conversation_hint.is_empty());
}

// =============================================================================
// Completion failures
// =============================================================================

#[tokio::test]
async fn test_single_rate_limit_is_retried() {
    let h = Harness::new(
        ScriptedBackend::replying("after retry").then(Err(CompletionError::RateLimited(
            "slow down".into(),
        ))),
    );
    let result = h.text_only().process(PipelineRequest::text(1, "hello")).await;

    assert!(result.is_success());
    assert_eq!(result.response_text, "after retry");
    assert_eq!(h.backend.calls(), 2);
    assert_eq!(h.records(1).len(), 1);
}

#[tokio::test]
async fn test_second_rate_limit_fails_pipeline() {
    let h = Harness::new(
        ScriptedBackend::replying("never")
            .then(Err(CompletionError::RateLimited("slow down".into())))
            .then(Err(CompletionError::RateLimited("still slow".into()))),
    );
    let result = h.text_only().process(PipelineRequest::text(1, "hello")).await;

    assert!(!result.is_success());
    assert_eq!(result.error_kind(), Some(ErrorKind::RateLimit));
    assert_eq!(result.response_text, apology_for(ErrorKind::RateLimit));
    assert_eq!(h.backend.calls(), 2);
    assert!(h.records(1).is_empty());
    assert!(result.history_id.is_none());
    assert_eq!(
        result.final_state(),
        Some(PipelineState::Failed(PipelineStage::Completion))
    );
}

#[tokio::test]
async fn test_upstream_failure_not_retried_and_skips_synthesis() {
    let h = Harness::new(
        ScriptedBackend::replying("never")
            .then(Err(CompletionError::Upstream("502: bad gateway".into()))),
    );
    let result = h
        .with_voice()
        .process(PipelineRequest::text(1, "hello").with_voice_reply())
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Upstream));
    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.voice.synthesize_calls(), 0);
    assert!(result.response_audio.is_none());
    assert!(h.records(1).is_empty());
}

#[tokio::test]
async fn test_auth_failure_not_retried() {
    let h = Harness::new(
        ScriptedBackend::replying("never")
            .then(Err(CompletionError::Unauthorized("invalid api key".into()))),
    );
    let result = h.text_only().process(PipelineRequest::text(1, "hello")).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Upstream));
    assert_eq!(h.backend.calls(), 1);
}

// =============================================================================
// Voice input
// =============================================================================

#[tokio::test]
async fn test_voice_round_trip() {
    let h = Harness::new(ScriptedBackend::replying("It is learning from data."));
    let id = h.add_ml_entry();

    let result = h
        .with_voice()
        .process(PipelineRequest::voice(9, b"OggS-clip".to_vec(), "ogg").with_voice_reply())
        .await;

    assert!(result.is_success());
    assert!(!result.is_degraded());
    assert_eq!(result.transcript.as_deref(), Some("What is machine learning?"));
    assert_eq!(result.matched_knowledge_ids, vec![id]);
    let audio = result.response_audio.as_ref().unwrap();
    assert_eq!(audio.format, AudioFormat::Mp3);
    assert_eq!(audio.bytes, b"MP3:default-voice:It is learning from data.".to_vec());
    assert_eq!(
        result.trace,
        vec![
            PipelineState::Received,
            PipelineState::Transcribed,
            PipelineState::ContextBuilt,
            PipelineState::Completed,
            PipelineState::Persisted,
            PipelineState::Synthesized,
            PipelineState::Done,
        ]
    );

    let records = h.records(9);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message, "What is machine learning?");
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn test_voice_override_used_for_reply() {
    let h = Harness::new(ScriptedBackend::replying("Hi"));
    let result = h
        .with_voice()
        .process(
            PipelineRequest::text(1, "hello")
                .with_voice_reply()
                .with_voice_id("my-clone"),
        )
        .await;
    assert_eq!(
        result.response_audio.unwrap().bytes,
        b"MP3:my-clone:Hi".to_vec()
    );
}

#[tokio::test]
async fn test_failed_transcription_writes_nothing() {
    let h = Harness::new(ScriptedBackend::replying("unused"));
    h.voice.set_fail_transcribe(true);

    let result = h
        .with_voice()
        .process(PipelineRequest::voice(9, b"OggS-clip".to_vec(), "ogg"))
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Transcription));
    assert_eq!(result.response_text, apology_for(ErrorKind::Transcription));
    assert!(result.transcript.is_none());
    assert_eq!(h.backend.calls(), 0);
    assert!(h.records(9).is_empty());
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn test_normalization_failure_is_audio_format_error() {
    let h = Harness::new(ScriptedBackend::replying("unused"));
    let orchestrator = h
        .text_only()
        .with_speech(h.bridge(Arc::new(FailingNormalizer)));

    let result = orchestrator
        .process(PipelineRequest::voice(9, b"OggS-clip".to_vec(), "audio/ogg"))
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::AudioFormat));
    assert_eq!(h.voice.transcribe_calls(), 0);
    assert!(h.records(9).is_empty());
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn test_unsupported_format_is_transcription_error() {
    let h = Harness::new(ScriptedBackend::replying("unused"));
    let result = h
        .with_voice()
        .process(PipelineRequest::voice(9, b"FORM".to_vec(), "aiff"))
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Transcription));
    assert_eq!(h.voice.transcribe_calls(), 0);
    assert!(h.records(9).is_empty());
}

#[tokio::test]
async fn test_oversized_transcript_rejected_like_text() {
    let mut h = Harness::new(ScriptedBackend::replying("unused"));
    h.voice = Arc::new(MockVoiceApi::new("word ".repeat(1000)));

    let result = h
        .with_voice()
        .process(PipelineRequest::voice(9, b"OggS-clip".to_vec(), "ogg"))
        .await;

    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
    assert_eq!(result.failure.as_ref().unwrap().stage, PipelineStage::Input);
    assert_eq!(
        result.final_state(),
        Some(PipelineState::Failed(PipelineStage::Input))
    );
    assert_eq!(h.voice.transcribe_calls(), 1);
    assert_eq!(h.backend.calls(), 0);
    assert!(h.records(9).is_empty());
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn test_voice_input_without_speech_configured() {
    let h = Harness::new(ScriptedBackend::replying("unused"));
    let result = h
        .text_only()
        .process(PipelineRequest::voice(9, b"OggS".to_vec(), "ogg"))
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Transcription));
    assert_eq!(h.backend.calls(), 0);
}

// =============================================================================
// Soft failures
// =============================================================================

#[tokio::test]
async fn test_synthesis_failure_keeps_text_reply() {
    let h = Harness::new(ScriptedBackend::replying("Here is the answer."));
    h.voice.set_fail_synthesize(true);

    let result = h
        .with_voice()
        .process(PipelineRequest::text(3, "hello").with_voice_reply())
        .await;

    assert!(result.is_success());
    assert!(result.is_degraded());
    assert_eq!(result.response_text, "Here is the answer.");
    assert!(result.response_audio.is_none());
    let warning = result.warning_for(PipelineStage::Synthesis).unwrap();
    assert_eq!(warning.kind, ErrorKind::Synthesis);
    assert_eq!(h.records(3).len(), 1);
    assert_eq!(result.final_state(), Some(PipelineState::Done));
    assert!(!result.trace.contains(&PipelineState::Synthesized));
    assert!(h.temp_is_empty());
}

#[tokio::test]
async fn test_voice_reply_without_speech_is_soft() {
    let h = Harness::new(ScriptedBackend::replying("text only"));
    let result = h
        .text_only()
        .process(PipelineRequest::text(3, "hello").with_voice_reply())
        .await;

    assert!(result.is_degraded());
    assert_eq!(result.response_text, "text only");
    assert!(result.warning_for(PipelineStage::Synthesis).is_some());
}

#[tokio::test]
async fn test_history_unavailable_is_soft() {
    let h = Harness::new(ScriptedBackend::replying("still answered"));
    let orchestrator = PipelineOrchestrator::new(
        ContextAssembler::new(h.knowledge.clone(), 3, 4000),
        h.client(),
        Arc::new(UnavailableHistory),
        "sys",
    );

    let result = orchestrator.process(PipelineRequest::text(1, "hello")).await;

    assert!(result.is_success());
    assert!(result.is_degraded());
    assert_eq!(result.response_text, "still answered");
    assert!(result.history_id.is_none());
    let warning = result.warning_for(PipelineStage::Persistence).unwrap();
    assert_eq!(warning.kind, ErrorKind::Storage);
    assert!(result.trace.contains(&PipelineState::Persisted));
}

// =============================================================================
// Concurrency and cancellation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(&dir.path().join("sage.db")).unwrap();
    let h = Harness::with_db(
        ScriptedBackend::replying("answer").with_delay(Duration::from_millis(20)),
        db,
    );
    h.add_ml_entry();
    let orchestrator = Arc::new(h.text_only());

    let mut handles = Vec::new();
    for i in 0..24i64 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .process(PipelineRequest::text(i % 3, format!("machine learning {}", i)))
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_success(), "{:?}", result.failure);
    }
    for user in 0..3 {
        assert_eq!(h.history.count_for_user(user).unwrap(), 8);
    }
    assert_eq!(h.backend.calls(), 24);
}

#[tokio::test]
async fn test_abandoned_invocation_leaves_nothing_behind() {
    let h = Harness::new(
        ScriptedBackend::replying("too late").with_delay(Duration::from_secs(30)),
    );
    let orchestrator = h.with_voice();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        orchestrator.process(PipelineRequest::voice(4, b"OggS-clip".to_vec(), "ogg")),
    )
    .await;

    assert!(abandoned.is_err());
    assert_eq!(h.voice.transcribe_calls(), 1);
    assert_eq!(h.backend.calls(), 1);
    assert!(h.records(4).is_empty());
    assert!(h.temp_is_empty());
}
