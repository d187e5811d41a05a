//! Completion client: deadline per attempt and the rate-limit retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use sage_core::config::CompletionConfig;

use crate::backend::CompletionBackend;
use crate::error::CompletionError;
use crate::request::CompletionRequest;

/// Retries allowed after a rate-limited attempt.
const MAX_RETRIES: u32 = 1;

/// Long-lived completion client shared by every pipeline invocation.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
    retry_delay: Duration,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            backend,
            timeout,
            retry_delay,
        }
    }

    pub fn from_config(backend: Arc<dyn CompletionBackend>, config: &CompletionConfig) -> Self {
        Self::new(
            backend,
            Duration::from_secs(config.timeout_secs),
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run the completion, retrying once after `retry_delay` if the endpoint
    /// signals throttling. Any other failure is returned immediately.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        error = %e,
                        "Completion rate limited, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let text = tokio::time::timeout(self.timeout, self.backend.complete(request))
            .await
            .map_err(|_| CompletionError::Timeout(self.timeout))??;

        let text = text.trim();
        if text.is_empty() {
            return Err(CompletionError::Upstream(
                "endpoint returned an empty completion".to_string(),
            ));
        }
        debug!(backend = self.backend.name(), chars = text.len(), "Completion received");
        Ok(text.to_string())
    }
}
