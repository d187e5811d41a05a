use async_trait::async_trait;

use crate::error::CompletionError;
use crate::request::CompletionRequest;

/// One remote (or local) completion round trip.
///
/// Implementations perform a single attempt; deadlines and retries are the
/// job of [`crate::CompletionClient`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}
