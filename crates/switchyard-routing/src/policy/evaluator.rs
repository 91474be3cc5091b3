use super::strategies::{prefer_tier, rank};
use crate::error::{Rejection, RejectionReason};
use crate::health::Availability;
use crate::registry::{PoolEntry, ProviderPool};
use crate::request::RoutingRequest;
use crate::{Result, RoutingError};
use std::time::Duration;
use switchyard_core::{
    BalancedWeights, ModelSpec, ModelTier, PRIVACY_SAFE_TAG, ProviderKind, RouterConfig, Strategy,
    estimate_tokens,
};
use tokio::time::Instant;
use tracing::debug;

/// One ranked (provider, model) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub provider_id: String,
    pub model_id: String,
    pub kind: ProviderKind,
    pub tier: ModelTier,
    /// Cost for the estimated input plus the configured expected output
    pub estimated_cost: f64,
    /// Rolling average latency, or the declared base latency before any call
    pub expected_latency_ms: f64,
    /// Whether the model covers the capability the complexity implies
    pub capability_match: bool,
    /// Strategy score; lower ranks first
    pub score: f64,
    /// Deadline of an attempt on this candidate
    pub timeout: Duration,
}

/// Ranked candidates for one request. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub candidates: Vec<Candidate>,
    pub strategy: Strategy,
    pub complexity: u8,
    /// Set when the capability requirement could not be met and was relaxed
    pub capability_relaxed: bool,
}

impl RoutingDecision {
    /// Upper bound on dispatch time: the sum of every attempt's timeout.
    pub fn worst_case_latency(&self) -> Duration {
        self.candidates
            .iter()
            .map(|candidate| candidate.timeout)
            .sum()
    }

    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Filters the pool by hard constraints, then ranks survivors by strategy.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    weights: BalancedWeights,
    max_candidates: usize,
    expected_output_tokens: u64,
    high_complexity_threshold: u8,
    high_complexity_tags: Vec<String>,
}

impl PolicyEvaluator {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            weights: config.balanced.clone(),
            max_candidates: config.max_candidates.max(1),
            expected_output_tokens: config.expected_output_tokens,
            high_complexity_threshold: config.estimator.high_complexity_threshold,
            high_complexity_tags: config.estimator.high_complexity_tags.clone(),
        }
    }

    /// Capability tags a complexity score requires; empty below the threshold.
    pub fn required_tags(&self, complexity: u8) -> &[String] {
        if complexity >= self.high_complexity_threshold {
            &self.high_complexity_tags
        } else {
            &[]
        }
    }

    /// Produce the ranked candidate list for `request`.
    ///
    /// # Errors
    /// Returns `NoEligibleProvider`, listing every rejection, when no
    /// (provider, model) pair survives the hard constraints.
    pub fn evaluate(
        &self,
        request: &RoutingRequest,
        complexity: u8,
        strategy: Strategy,
        pool: &ProviderPool,
        budget_exhausted: bool,
    ) -> Result<RoutingDecision> {
        let now = Instant::now();
        let input_tokens = estimate_tokens(&request.text);
        let required = self.required_tags(complexity);

        let mut rejections = Vec::new();
        let mut survivors = Vec::new();
        for entry in pool.entries() {
            let availability = entry.health().availability(now);
            for model in &entry.descriptor().models {
                let candidate = self.candidate(entry, model, input_tokens, required, request);
                match self.check(request, entry, model, &candidate, availability, budget_exhausted) {
                    Some(reason) => {
                        debug!(
                            correlation_id = %request.correlation_id,
                            provider = %entry.id(),
                            model = %model.id,
                            %reason,
                            "Candidate rejected"
                        );
                        rejections.push(Rejection {
                            provider: entry.id().to_owned(),
                            model: model.id.clone(),
                            reason,
                        });
                    }
                    None => survivors.push(candidate),
                }
            }
        }

        if survivors.is_empty() {
            return Err(RoutingError::NoEligibleProvider { rejections });
        }

        let mut capability_relaxed = false;
        if !required.is_empty() {
            if survivors.iter().any(|candidate| candidate.capability_match) {
                survivors.retain(|candidate| candidate.capability_match);
            } else {
                capability_relaxed = true;
                debug!(
                    correlation_id = %request.correlation_id,
                    complexity,
                    "No capable model survived filtering, ranking without capability requirement"
                );
            }
        }

        rank(&mut survivors, strategy, &self.weights);
        if matches!(strategy, Strategy::Balanced | Strategy::PerformanceOptimized) {
            prefer_tier(&mut survivors, complexity);
        }
        survivors.truncate(self.max_candidates);

        Ok(RoutingDecision {
            candidates: survivors,
            strategy,
            complexity,
            capability_relaxed,
        })
    }

    fn candidate(
        &self,
        entry: &PoolEntry,
        model: &ModelSpec,
        input_tokens: u64,
        required: &[String],
        request: &RoutingRequest,
    ) -> Candidate {
        let kind = entry.descriptor().kind;
        let mut timeout = entry.attempt_timeout();
        if let Some(ceiling) = request.options.max_latency_ms {
            timeout = timeout.min(Duration::from_millis(ceiling));
        }
        Candidate {
            provider_id: entry.id().to_owned(),
            model_id: model.id.clone(),
            kind,
            tier: model.tier,
            estimated_cost: model.cost_for(input_tokens, self.expected_output_tokens),
            expected_latency_ms: entry.health().ema_latency_ms(),
            capability_match: required.is_empty() || model.has_any_tag(required),
            score: 0.0,
            timeout,
        }
    }

    /// First hard constraint the pair violates, in filter order.
    fn check(
        &self,
        request: &RoutingRequest,
        entry: &PoolEntry,
        model: &ModelSpec,
        candidate: &Candidate,
        availability: Availability,
        budget_exhausted: bool,
    ) -> Option<RejectionReason> {
        let options = &request.options;
        if options.privacy_sensitive && !model.has_tag(PRIVACY_SAFE_TAG) {
            return Some(RejectionReason::NotPrivacySafe);
        }
        match availability {
            Availability::Routable => {}
            Availability::CircuitOpen => return Some(RejectionReason::CircuitOpen),
            Availability::CircuitHalfOpen => return Some(RejectionReason::CircuitHalfOpen),
            Availability::RateLimited => return Some(RejectionReason::RateLimitCooldown),
        }
        if budget_exhausted && !entry.descriptor().kind.is_local() {
            return Some(RejectionReason::DailyBudgetExhausted);
        }
        if let Some(ceiling) = options.max_cost
            && candidate.estimated_cost > ceiling
        {
            return Some(RejectionReason::OverCostCeiling {
                estimated: candidate.estimated_cost,
                ceiling,
            });
        }
        if let Some(ceiling_ms) = options.max_latency_ms
            && candidate.expected_latency_ms > ceiling_ms as f64
        {
            return Some(RejectionReason::OverLatencyCeiling {
                observed_ms: candidate.expected_latency_ms.round() as u64,
                ceiling_ms,
            });
        }
        None
    }
}
