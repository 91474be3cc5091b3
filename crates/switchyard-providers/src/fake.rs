//! Scripted provider for exercising routing without network access.
//!
//! Each call pops the next scripted [`FakeOutcome`], falling back to a
//! default once the script is drained. Latency is simulated with
//! `tokio::time::sleep`, so tests running on paused time stay instant.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard_core::{
    Completion, ErrorClass, HealthReport, IgnoreLock as _, ProviderAdapter, ProviderDescriptor,
    ProviderError, ProviderResult, estimate_tokens,
};
use tokio::time::{sleep, timeout as with_timeout};

/// What a fake call does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOutcome {
    /// Answer with the prompt itself, counting tokens from its length.
    Echo,
    /// Answer with fixed text and token counts.
    Succeed {
        /// Completion text
        text: String,
        /// Billed input tokens
        input_tokens: u64,
        /// Billed output tokens
        output_tokens: u64,
    },
    /// Fail with the given class.
    Fail(ErrorClass),
    /// Never answer; only the caller's timeout ends the call.
    Hang,
}

impl FakeOutcome {
    /// Shorthand for a fixed successful answer.
    pub fn succeed(text: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self::Succeed {
            text: text.into(),
            input_tokens,
            output_tokens,
        }
    }
}

/// One observed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    /// Requested model
    pub model_id: String,
    /// Prompt as received
    pub prompt: String,
}

/// Decrements the in-flight counter when a call ends, including when its
/// future is dropped mid-flight.
struct InFlightGuard<'counter>(&'counter AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Provider double with scripted outcomes and call accounting.
#[derive(Clone)]
pub struct FakeProvider {
    /// Static descriptor with model pricing
    descriptor: ProviderDescriptor,
    /// Outcomes consumed in order
    script: Arc<Mutex<VecDeque<FakeOutcome>>>,
    /// Outcome once the script is empty
    default_outcome: Arc<Mutex<FakeOutcome>>,
    /// Simulated service time for calls and probes
    latency: Arc<Mutex<Duration>>,
    /// Probe answer
    healthy: Arc<AtomicBool>,
    /// Call history for verification
    calls: Arc<Mutex<Vec<FakeCall>>>,
    /// Number of health probes received
    health_checks: Arc<AtomicUsize>,
    /// Calls currently executing
    in_flight: Arc<AtomicUsize>,
    /// High-water mark of `in_flight`
    peak_in_flight: Arc<AtomicUsize>,
}

impl FakeProvider {
    /// Create a healthy fake that echoes prompts with no latency.
    #[must_use]
    pub fn new(descriptor: ProviderDescriptor) -> Self {
        Self {
            descriptor,
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_outcome: Arc::new(Mutex::new(FakeOutcome::Echo)),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
            healthy: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(Mutex::new(Vec::new())),
            health_checks: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue outcomes for the next calls.
    #[must_use]
    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = FakeOutcome>) -> Self {
        self.script.lock_ignore_poison().extend(outcomes);
        self
    }

    /// Set the outcome used once the script is drained.
    #[must_use]
    pub fn with_default(self, outcome: FakeOutcome) -> Self {
        self.set_default(outcome);
        self
    }

    /// Set the simulated service time.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Queue one more outcome.
    pub fn push_outcome(&self, outcome: FakeOutcome) {
        self.script.lock_ignore_poison().push_back(outcome);
    }

    /// Replace the outcome used once the script is drained.
    pub fn set_default(&self, outcome: FakeOutcome) {
        *self.default_outcome.lock_ignore_poison() = outcome;
    }

    /// Replace the simulated service time.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock_ignore_poison() = latency;
    }

    /// Control what health probes report.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `complete` calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock_ignore_poison().len()
    }

    /// Copy of the call history.
    #[must_use]
    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock_ignore_poison().clone()
    }

    /// Number of health probes received.
    #[must_use]
    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> FakeOutcome {
        let scripted = self.script.lock_ignore_poison().pop_front();
        scripted.unwrap_or_else(|| self.default_outcome.lock_ignore_poison().clone())
    }

    fn current_latency(&self) -> Duration {
        *self.latency.lock_ignore_poison()
    }

    async fn respond(&self, model_id: &str, prompt: &str) -> ProviderResult<Completion> {
        let outcome = self.next_outcome();
        let latency = self.current_latency();
        if !latency.is_zero() {
            sleep(latency).await;
        }

        let (text, input_tokens, output_tokens) = match outcome {
            FakeOutcome::Echo => {
                let tokens = estimate_tokens(prompt);
                (prompt.to_owned(), tokens, tokens)
            }
            FakeOutcome::Succeed {
                text,
                input_tokens,
                output_tokens,
            } => (text, input_tokens, output_tokens),
            FakeOutcome::Fail(class) => {
                return Err(ProviderError::new(
                    class,
                    format!("{} scripted failure", self.descriptor.id),
                ));
            }
            FakeOutcome::Hang => {
                futures::future::pending::<()>().await;
                return Err(ProviderError::unavailable("unreachable"));
            }
        };

        let cost = self
            .descriptor
            .model(model_id)
            .map_or(0.0, |model| model.cost_for(input_tokens, output_tokens));

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
            cost,
        })
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn capabilities(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn health_check(&self, timeout: Duration) -> HealthReport {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        let latency = self.current_latency();
        if latency > timeout {
            sleep(timeout).await;
            return HealthReport {
                healthy: false,
                latency: timeout,
            };
        }
        if !latency.is_zero() {
            sleep(latency).await;
        }
        HealthReport {
            healthy: self.healthy.load(Ordering::SeqCst),
            latency,
        }
    }

    async fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> ProviderResult<Completion> {
        self.calls.lock_ignore_poison().push(FakeCall {
            model_id: model_id.to_owned(),
            prompt: prompt.to_owned(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if self.descriptor.model(model_id).is_none() {
            return Err(ProviderError::invalid_request(format!(
                "{} does not serve model {model_id}",
                self.descriptor.id
            )));
        }

        match with_timeout(timeout, self.respond(model_id, prompt)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ProviderError::unavailable(format!(
                "{} timed out after {}ms",
                self.descriptor.id,
                timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{ModelSpec, ModelTier, ProviderKind};

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            id: "fake".to_owned(),
            kind: ProviderKind::Cloud,
            models: vec![ModelSpec {
                id: "fake-model".to_owned(),
                cost_in_per_1k: 1.0,
                cost_out_per_1k: 2.0,
                capability_tags: Vec::new(),
                tier: ModelTier::Standard,
            }],
            base_latency_ms: 100,
            max_concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_script_then_default() {
        let fake = FakeProvider::new(descriptor())
            .with_outcomes([FakeOutcome::Fail(ErrorClass::RateLimited)])
            .with_default(FakeOutcome::succeed("done", 1000, 500));

        let first = fake
            .complete("fake-model", "hi", Duration::from_secs(1))
            .await;
        match first {
            Err(error) => assert_eq!(error.class, ErrorClass::RateLimited),
            Ok(_) => panic!("first call should fail"),
        }

        let second = match fake
            .complete("fake-model", "hi", Duration::from_secs(1))
            .await
        {
            Ok(completion) => completion,
            Err(error) => panic!("second call failed: {error}"),
        };
        assert_eq!(second.text, "done");
        assert!((second.cost - 2.0).abs() < 1e-9);
        assert_eq!(fake.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_times_out_as_unavailable() {
        let fake = FakeProvider::new(descriptor()).with_default(FakeOutcome::Hang);
        let result = fake
            .complete("fake-model", "hi", Duration::from_millis(250))
            .await;
        match result {
            Err(error) => assert_eq!(error.class, ErrorClass::Unavailable),
            Ok(_) => panic!("hang should time out"),
        }
        assert_eq!(fake.peak_in_flight(), 1);
        assert_eq!(fake.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_reports_unhealthy() {
        let fake = FakeProvider::new(descriptor()).with_latency(Duration::from_secs(10));
        let report = fake.health_check(Duration::from_secs(1)).await;
        assert!(!report.healthy);
        assert_eq!(fake.health_check_count(), 1);

        fake.set_latency(Duration::ZERO);
        fake.set_healthy(false);
        assert!(!fake.health_check(Duration::from_secs(1)).await.healthy);
        fake.set_healthy(true);
        assert!(fake.health_check(Duration::from_secs(1)).await.healthy);
    }

    #[tokio::test]
    async fn test_echo_counts_tokens() {
        let fake = FakeProvider::new(descriptor());
        let completion = match fake
            .complete("fake-model", "abcdefgh", Duration::from_secs(1))
            .await
        {
            Ok(completion) => completion,
            Err(error) => panic!("echo failed: {error}"),
        };
        assert_eq!(completion.text, "abcdefgh");
        assert_eq!(completion.input_tokens, 2);
        assert_eq!(completion.output_tokens, 2);
        assert_eq!(
            fake.calls(),
            vec![FakeCall {
                model_id: "fake-model".to_owned(),
                prompt: "abcdefgh".to_owned(),
            }]
        );
    }
}
