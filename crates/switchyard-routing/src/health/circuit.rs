use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use switchyard_core::{CircuitBreakerConfig, ErrorClass, HealthReport, IgnoreLock as _};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Externally visible circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Traffic flows normally
    Closed,
    /// Provider is excluded from routing
    Open,
    /// Cooldown elapsed; waiting for one probe to decide
    HalfOpen,
}

/// Whether a provider may receive traffic right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Routable,
    CircuitOpen,
    CircuitHalfOpen,
    RateLimited,
}

/// What a probe round should do with a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    Probe,
    Skip,
}

#[derive(Debug, Clone, Copy)]
enum Circuit {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct HealthState {
    consecutive_failures: u32,
    circuit: Circuit,
    ema_latency_ms: f64,
    rate_limited_until: Option<Instant>,
    last_check: Option<Instant>,
}

/// Point-in-time copy of a provider's health.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub provider_id: String,
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
    pub ema_latency_ms: f64,
    pub rate_limited: bool,
    pub last_check: Option<Instant>,
}

/// Mutable health of one provider.
///
/// Every mutation takes this provider's own lock, so updates from concurrent
/// dispatches and the background prober never serialize unrelated providers.
#[derive(Debug)]
pub struct ProviderHealth {
    provider_id: String,
    failure_threshold: u32,
    cooldown: Duration,
    alpha: f64,
    state: Mutex<HealthState>,
}

impl ProviderHealth {
    /// Fresh closed circuit whose latency average starts at `base_latency_ms`.
    pub fn new(
        provider_id: impl Into<String>,
        base_latency_ms: u64,
        breaker: &CircuitBreakerConfig,
        alpha: f64,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            failure_threshold: breaker.failure_threshold.max(1),
            cooldown: breaker.cooldown(),
            alpha,
            state: Mutex::new(HealthState {
                consecutive_failures: 0,
                circuit: Circuit::Closed,
                ema_latency_ms: base_latency_ms as f64,
                rate_limited_until: None,
                last_check: None,
            }),
        }
    }

    /// Provider this record belongs to.
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Record a completed call.
    pub fn record_success(&self, latency: Duration) {
        let mut state = self.state.lock_ignore_poison();
        state.consecutive_failures = 0;
        state.ema_latency_ms = self.blend(state.ema_latency_ms, latency);
        state.last_check = Some(Instant::now());
    }

    /// Record a failed call. Classes that say nothing about the provider are ignored.
    pub fn record_failure(&self, class: ErrorClass) {
        if !class.affects_health() {
            return;
        }
        let now = Instant::now();
        let mut state = self.state.lock_ignore_poison();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_check = Some(now);

        if class == ErrorClass::RateLimited {
            state.rate_limited_until = Some(now + self.cooldown);
            debug!(provider = %self.provider_id, "Rate limited, holding out for cooldown");
        }

        match state.circuit {
            Circuit::Closed if state.consecutive_failures >= self.failure_threshold => {
                state.circuit = Circuit::Open { since: now };
                warn!(
                    provider = %self.provider_id,
                    failures = state.consecutive_failures,
                    "Circuit opened"
                );
            }
            Circuit::HalfOpen => {
                state.circuit = Circuit::Open { since: now };
                info!(provider = %self.provider_id, "Circuit re-opened");
            }
            Circuit::Closed | Circuit::Open { .. } => {}
        }
    }

    /// Whether the provider may be routed to at `now`.
    pub fn availability(&self, now: Instant) -> Availability {
        let state = self.state.lock_ignore_poison();
        match state.circuit {
            Circuit::Open { .. } => Availability::CircuitOpen,
            Circuit::HalfOpen => Availability::CircuitHalfOpen,
            Circuit::Closed => match state.rate_limited_until {
                Some(until) if now < until => Availability::RateLimited,
                _ => Availability::Routable,
            },
        }
    }

    /// Decide whether to probe at `now`, moving an open circuit whose cooldown
    /// has elapsed to half-open.
    pub fn begin_probe(&self, now: Instant) -> ProbeAction {
        let mut state = self.state.lock_ignore_poison();
        match state.circuit {
            Circuit::Open { since } if now.duration_since(since) >= self.cooldown => {
                state.circuit = Circuit::HalfOpen;
                info!(provider = %self.provider_id, "Circuit half-open, probing");
                ProbeAction::Probe
            }
            Circuit::Open { .. } => ProbeAction::Skip,
            Circuit::Closed | Circuit::HalfOpen => ProbeAction::Probe,
        }
    }

    /// Apply a probe result.
    pub fn record_probe(&self, report: HealthReport) {
        let now = Instant::now();
        let mut state = self.state.lock_ignore_poison();
        state.last_check = Some(now);

        if report.healthy {
            state.consecutive_failures = 0;
            state.ema_latency_ms = self.blend(state.ema_latency_ms, report.latency);
            if matches!(state.circuit, Circuit::HalfOpen) {
                state.circuit = Circuit::Closed;
                state.rate_limited_until = None;
                info!(provider = %self.provider_id, "Circuit closed after successful probe");
            }
            return;
        }

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        match state.circuit {
            Circuit::HalfOpen => {
                state.circuit = Circuit::Open { since: now };
                info!(provider = %self.provider_id, "Probe failed, circuit re-opened");
            }
            Circuit::Closed if state.consecutive_failures >= self.failure_threshold => {
                state.circuit = Circuit::Open { since: now };
                warn!(
                    provider = %self.provider_id,
                    failures = state.consecutive_failures,
                    "Circuit opened by failing probes"
                );
            }
            Circuit::Closed | Circuit::Open { .. } => {}
        }
    }

    /// Rolling average latency in milliseconds.
    pub fn ema_latency_ms(&self) -> f64 {
        self.state.lock_ignore_poison().ema_latency_ms
    }

    /// Current circuit state.
    pub fn circuit_state(&self) -> CircuitState {
        match self.state.lock_ignore_poison().circuit {
            Circuit::Closed => CircuitState::Closed,
            Circuit::Open { .. } => CircuitState::Open,
            Circuit::HalfOpen => CircuitState::HalfOpen,
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> HealthSnapshot {
        let now = Instant::now();
        let state = self.state.lock_ignore_poison();
        HealthSnapshot {
            provider_id: self.provider_id.clone(),
            circuit: match state.circuit {
                Circuit::Closed => CircuitState::Closed,
                Circuit::Open { .. } => CircuitState::Open,
                Circuit::HalfOpen => CircuitState::HalfOpen,
            },
            consecutive_failures: state.consecutive_failures,
            ema_latency_ms: state.ema_latency_ms,
            rate_limited: state.rate_limited_until.is_some_and(|until| now < until),
            last_check: state.last_check,
        }
    }

    fn blend(&self, previous_ms: f64, observed: Duration) -> f64 {
        let observed_ms = observed.as_secs_f64() * 1000.0;
        self.alpha.mul_add(observed_ms - previous_ms, previous_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn health() -> ProviderHealth {
        let breaker = CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown_seconds: 30,
        };
        ProviderHealth::new("a", 1000, &breaker, 0.5)
    }

    fn report(healthy: bool) -> HealthReport {
        HealthReport {
            healthy,
            latency: Duration::from_millis(200),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        let health = health();
        health.record_failure(ErrorClass::Unavailable);
        health.record_failure(ErrorClass::ProviderInternal);
        assert_eq!(health.availability(Instant::now()), Availability::Routable);
        health.record_failure(ErrorClass::Unavailable);
        assert_eq!(health.availability(Instant::now()), Availability::CircuitOpen);
        assert_eq!(health.circuit_state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_streak() {
        let health = health();
        health.record_failure(ErrorClass::Unavailable);
        health.record_failure(ErrorClass::Unavailable);
        health.record_success(Duration::from_millis(100));
        health.record_failure(ErrorClass::Unavailable);
        assert_eq!(health.circuit_state(), CircuitState::Closed);
        assert_eq!(health.snapshot().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_errors_do_not_count() {
        let health = health();
        for _ in 0..5 {
            health.record_failure(ErrorClass::InvalidRequest);
            health.record_failure(ErrorClass::PolicyViolation);
        }
        assert_eq!(health.circuit_state(), CircuitState::Closed);
        assert_eq!(health.snapshot().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_requires_cooldown_and_probe() {
        let health = health();
        for _ in 0..3 {
            health.record_failure(ErrorClass::Unavailable);
        }
        assert_eq!(health.begin_probe(Instant::now()), ProbeAction::Skip);

        advance(Duration::from_secs(30)).await;
        assert_eq!(health.availability(Instant::now()), Availability::CircuitOpen);
        assert_eq!(health.begin_probe(Instant::now()), ProbeAction::Probe);
        assert_eq!(health.availability(Instant::now()), Availability::CircuitHalfOpen);

        health.record_probe(report(true));
        assert_eq!(health.availability(Instant::now()), Availability::Routable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let health = health();
        for _ in 0..3 {
            health.record_failure(ErrorClass::Unavailable);
        }
        advance(Duration::from_secs(31)).await;
        assert_eq!(health.begin_probe(Instant::now()), ProbeAction::Probe);
        health.record_probe(report(false));
        assert_eq!(health.circuit_state(), CircuitState::Open);

        advance(Duration::from_secs(10)).await;
        assert_eq!(health.begin_probe(Instant::now()), ProbeAction::Skip);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cooldown() {
        let health = health();
        health.record_failure(ErrorClass::RateLimited);
        assert_eq!(health.availability(Instant::now()), Availability::RateLimited);
        assert!(health.snapshot().rate_limited);

        advance(Duration::from_secs(30)).await;
        assert_eq!(health.availability(Instant::now()), Availability::Routable);
    }

    #[test]
    fn test_latency_average() {
        let health = health();
        assert!((health.ema_latency_ms() - 1000.0).abs() < 1e-9);
        health.record_success(Duration::from_millis(200));
        assert!((health.ema_latency_ms() - 600.0).abs() < 1e-9);
        health.record_probe(report(true));
        assert!((health.ema_latency_ms() - 400.0).abs() < 1e-9);
    }
}
