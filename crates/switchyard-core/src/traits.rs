use async_trait::async_trait;
use std::time::Duration;

use crate::{Completion, HealthReport, ProviderDescriptor, ProviderResult};

/// Uniform contract over one LLM backend, cloud API or local inference server.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the static descriptor of this backend.
    fn capabilities(&self) -> &ProviderDescriptor;

    /// Checks liveness within `timeout`, reporting the observed round trip.
    async fn health_check(&self, timeout: Duration) -> HealthReport;

    /// Runs one completion against `model_id`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`crate::ProviderError`]. A timed-out call is
    /// `Unavailable` and attributes no tokens or cost.
    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> ProviderResult<Completion>;
}
