//! Scripted completion backend for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::CompletionBackend;
use crate::error::CompletionError;
use crate::request::CompletionRequest;

/// Replays queued outcomes in order, then falls back to a fixed reply.
///
/// Every request it sees is recorded so callers can inspect the prompt.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    outcomes: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    /// A backend that always answers `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            fallback: reply.into(),
            ..Self::default()
        }
    }

    /// Queue an outcome to be returned before the fallback reply.
    pub fn then(self, outcome: Result<String, CompletionError>) -> Self {
        if let Ok(mut q) = self.outcomes.lock() {
            q.push_back(outcome);
        }
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.outcomes.lock().ok().and_then(|mut q| q.pop_front());
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
