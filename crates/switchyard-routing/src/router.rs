use crate::analyzer::ComplexityEstimator;
use crate::dispatcher::{DispatchSuccess, Dispatcher};
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::ledger::{RecordContext, UsageLedger, UsageOutcome, UsageRecord, UsageSummary};
use crate::policy::{PolicyEvaluator, RoutingDecision};
use crate::registry::ProviderPool;
use crate::request::{RouteOptions, RouteResponse, RoutingRequest};
use crate::{Result, RoutingError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use switchyard_core::{HealthConfig, IgnoreLock as _, RouterConfig, Strategy};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Routes inference requests across a provider pool.
///
/// Construct one per configuration and share it by reference or `Arc`.
/// Instances are fully independent, so several can coexist in one process.
pub struct Router {
    pool: Arc<ProviderPool>,
    estimator: ComplexityEstimator,
    evaluator: PolicyEvaluator,
    dispatcher: Dispatcher,
    ledger: Arc<UsageLedger>,
    default_strategy: Strategy,
    daily_cost_budget: Option<f64>,
    hedge_when_latency_preferred: bool,
    health_config: HealthConfig,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl Router {
    /// Build a router with real adapters for every configured provider.
    ///
    /// Usage is persisted to `ledger.path` when set, restoring earlier
    /// history so the daily budget survives restarts.
    ///
    /// # Errors
    /// Returns an error on invalid configuration, a missing API key, an
    /// unreadable ledger file, or when persistence is configured outside a
    /// Tokio runtime.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let pool = ProviderPool::from_config(config)?;
        let ledger = match &config.ledger.path {
            Some(path) => UsageLedger::restore(path, &config.ledger)?,
            None => UsageLedger::in_memory(&config.ledger),
        };
        Self::with_ledger(config, pool, Arc::new(ledger))
    }

    /// Build a router over an existing pool with an in-memory ledger.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &RouterConfig, pool: ProviderPool) -> Result<Self> {
        let ledger = UsageLedger::in_memory(&config.ledger);
        Self::with_ledger(config, pool, Arc::new(ledger))
    }

    /// Build a router over an existing pool and ledger.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_ledger(
        config: &RouterConfig,
        pool: ProviderPool,
        ledger: Arc<UsageLedger>,
    ) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(pool);
        Ok(Self {
            estimator: ComplexityEstimator::from_config(&config.estimator)?,
            evaluator: PolicyEvaluator::from_config(config),
            dispatcher: Dispatcher::new(Arc::clone(&pool)),
            pool,
            ledger,
            default_strategy: config.strategy_default,
            daily_cost_budget: config.daily_cost_budget,
            hedge_when_latency_preferred: config.hedge_when_latency_preferred,
            health_config: config.health.clone(),
            monitor: Mutex::new(None),
        })
    }

    /// Route one request to the best available provider.
    ///
    /// # Errors
    /// Returns `InvalidRequest`, `NoEligibleProvider` or `AllProvidersFailed`.
    pub async fn route(&self, text: &str, options: RouteOptions) -> Result<RouteResponse> {
        self.route_with_cancel(text, options, &CancellationToken::new())
            .await
    }

    /// Route one request, aborting when `cancel` fires.
    ///
    /// Exactly one usage record is written per terminal outcome. A cancelled
    /// request is not an outcome and writes none.
    ///
    /// # Errors
    /// As [`Router::route`], plus `Cancelled`.
    pub async fn route_with_cancel(
        &self,
        text: &str,
        options: RouteOptions,
        cancel: &CancellationToken,
    ) -> Result<RouteResponse> {
        let started = Instant::now();
        let request = RoutingRequest::new(text, options);
        let strategy = request
            .options
            .strategy_override
            .unwrap_or(self.default_strategy);

        if let Err(error) = request.validate() {
            self.record_failure(&request, strategy, 0, started, &error);
            return Err(error);
        }

        let complexity = self
            .estimator
            .estimate(&request.text, request.options.task_hint.as_deref());

        let decision = match self.decide(&request, complexity, strategy) {
            Ok(decision) => decision,
            Err(error) => {
                self.record_failure(&request, strategy, complexity, started, &error);
                return Err(error);
            }
        };

        info!(
            correlation_id = %request.correlation_id,
            complexity,
            %strategy,
            candidates = decision.len(),
            top = decision.top().map_or("", |candidate| candidate.provider_id.as_str()),
            worst_case_ms = decision.worst_case_latency().as_millis(),
            "Routing decision"
        );

        let hedge = self.hedge_when_latency_preferred && request.options.prefer_latency;
        match self
            .dispatcher
            .dispatch(&request, &decision, hedge, cancel)
            .await
        {
            Ok(success) => Ok(self.complete(&request, &decision, success, started)),
            Err(RoutingError::Cancelled) => Err(RoutingError::Cancelled),
            Err(error) => {
                self.record_failure(&request, strategy, complexity, started, &error);
                Err(error)
            }
        }
    }

    /// Ranked candidates for `text` without dispatching or recording.
    ///
    /// # Errors
    /// Returns `InvalidRequest` or `NoEligibleProvider`.
    pub fn evaluate(&self, text: &str, options: RouteOptions) -> Result<RoutingDecision> {
        let request = RoutingRequest::new(text, options);
        request.validate()?;
        let strategy = request
            .options
            .strategy_override
            .unwrap_or(self.default_strategy);
        let complexity = self
            .estimator
            .estimate(&request.text, request.options.task_hint.as_deref());
        self.decide(&request, complexity, strategy)
    }

    fn decide(
        &self,
        request: &RoutingRequest,
        complexity: u8,
        strategy: Strategy,
    ) -> Result<RoutingDecision> {
        let budget_exhausted = self.budget_exhausted();
        if budget_exhausted {
            warn!(
                correlation_id = %request.correlation_id,
                "Daily budget exhausted, routing to local providers only"
            );
        }
        self.evaluator
            .evaluate(request, complexity, strategy, &self.pool, budget_exhausted)
    }

    /// Whether rolling 24h spend has reached the daily budget.
    pub fn budget_exhausted(&self) -> bool {
        self.daily_cost_budget
            .is_some_and(|budget| self.ledger.rolling_spend(Utc::now()) >= budget)
    }

    fn complete(
        &self,
        request: &RoutingRequest,
        decision: &RoutingDecision,
        success: DispatchSuccess,
        started: Instant,
    ) -> RouteResponse {
        let latency_ms = started.elapsed().as_millis() as u64;
        let completion = success.completion;
        self.ledger.record(UsageRecord::success(
            record_context(request, decision.strategy, decision.complexity, latency_ms),
            &success.provider_id,
            &success.model_id,
            (completion.input_tokens, completion.output_tokens),
            completion.cost,
            success.calls_made as u32,
        ));

        if success.fallback_depth > 0 {
            info!(
                correlation_id = %request.correlation_id,
                provider = %success.provider_id,
                model = %success.model_id,
                depth = success.fallback_depth,
                "Answered by fallback candidate"
            );
        }

        RouteResponse {
            text: completion.text,
            provider_used: success.provider_id,
            model_used: success.model_id,
            cost: completion.cost,
            latency_ms,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            fallback_depth: success.fallback_depth,
            attempts: success.failures,
            complexity: decision.complexity,
            strategy: decision.strategy,
            correlation_id: request.correlation_id.clone(),
        }
    }

    fn record_failure(
        &self,
        request: &RoutingRequest,
        strategy: Strategy,
        complexity: u8,
        started: Instant,
        error: &RoutingError,
    ) {
        if !error.is_terminal_outcome() {
            return;
        }
        let outcome = match error {
            RoutingError::InvalidRequest { .. } => UsageOutcome::InvalidRequest,
            RoutingError::NoEligibleProvider { .. } => UsageOutcome::NoEligibleProvider,
            _ => UsageOutcome::AllProvidersFailed,
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        let attempts = error.attempts();
        let last = attempts
            .last()
            .map(|failure| (failure.provider.as_str(), failure.model.as_str(), failure.class));
        warn!(
            correlation_id = %request.correlation_id,
            %error,
            "Routing failed"
        );
        self.ledger.record(UsageRecord::failure(
            record_context(request, strategy, complexity, latency_ms),
            outcome,
            last,
            attempts.len() as u32,
        ));
    }

    /// Aggregate usage recorded in `[since, until)`.
    pub fn usage_summary(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> UsageSummary {
        self.ledger.summarize(since, until)
    }

    /// Health of every provider, in pool order.
    pub fn health_snapshot(&self) -> Vec<HealthSnapshot> {
        self.pool.health_snapshot()
    }

    /// Start periodic background probes. Must run inside a Tokio runtime;
    /// calling it again is a no-op.
    pub fn start_health_probes(&self) {
        let mut monitor = self.monitor.lock_ignore_poison();
        if monitor.is_some() {
            return;
        }
        let mut started = HealthMonitor::new(Arc::clone(&self.pool), &self.health_config);
        started.start();
        *monitor = Some(started);
    }

    /// Run one probe round over every provider now.
    pub async fn probe_now(&self) {
        crate::health::monitor::probe_pool(&self.pool, self.health_config.probe_timeout()).await;
    }

    /// Stop background probes and flush the ledger.
    pub async fn shutdown(&self) {
        let monitor = self.monitor.lock_ignore_poison().take();
        if let Some(monitor) = monitor {
            monitor.shutdown().await;
        }
        self.ledger.shutdown().await;
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn pool(&self) -> &ProviderPool {
        &self.pool
    }
}

fn record_context(
    request: &RoutingRequest,
    strategy: Strategy,
    complexity: u8,
    latency_ms: u64,
) -> RecordContext {
    RecordContext {
        correlation_id: request.correlation_id.clone(),
        strategy,
        complexity,
        latency_ms,
    }
}
