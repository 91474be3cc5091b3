//! Candidate ordering per strategy.
//!
//! All sorts are stable, so equal candidates keep pool order and the ranking
//! is reproducible for identical inputs.

use super::evaluator::Candidate;
use std::cmp::Ordering;
use switchyard_core::{BalancedWeights, ModelTier, Strategy};

/// Score every candidate and sort ascending (best first).
pub fn rank(candidates: &mut [Candidate], strategy: Strategy, weights: &BalancedWeights) {
    match strategy {
        Strategy::CostOptimized => {
            for candidate in candidates.iter_mut() {
                candidate.score = candidate.estimated_cost;
            }
            candidates.sort_by(|left, right| by_cost(left, right).then_with(|| by_latency(left, right)));
        }
        Strategy::PerformanceOptimized => {
            for candidate in candidates.iter_mut() {
                candidate.score = candidate.expected_latency_ms;
            }
            candidates.sort_by(|left, right| by_latency(left, right).then_with(|| by_cost(left, right)));
        }
        Strategy::PrivacyFirst => {
            for candidate in candidates.iter_mut() {
                candidate.score = candidate.estimated_cost;
            }
            candidates.sort_by(|left, right| {
                right
                    .kind
                    .is_local()
                    .cmp(&left.kind.is_local())
                    .then_with(|| by_cost(left, right))
                    .then_with(|| by_latency(left, right))
            });
        }
        Strategy::Balanced => {
            score_balanced(candidates, weights);
            candidates.sort_by(|left, right| {
                left.score
                    .total_cmp(&right.score)
                    .then_with(|| by_cost(left, right))
                    .then_with(|| by_latency(left, right))
            });
        }
    }
}

/// Weighted blend of cost and latency normalized by the largest value among
/// the candidates, plus a penalty when the capability requirement is unmet.
fn score_balanced(candidates: &mut [Candidate], weights: &BalancedWeights) {
    let max_cost = candidates
        .iter()
        .map(|candidate| candidate.estimated_cost)
        .fold(0.0, f64::max);
    let max_latency = candidates
        .iter()
        .map(|candidate| candidate.expected_latency_ms)
        .fold(0.0, f64::max);

    for candidate in candidates.iter_mut() {
        let cost = normalize(candidate.estimated_cost, max_cost);
        let latency = normalize(candidate.expected_latency_ms, max_latency);
        let capability_gap = if candidate.capability_match { 0.0 } else { 1.0 };
        candidate.score = weights.capability_weight.mul_add(
            capability_gap,
            weights
                .cost_weight
                .mul_add(cost, weights.latency_weight * latency),
        );
    }
}

fn normalize(value: f64, max: f64) -> f64 {
    if max > 0.0 { value / max } else { 0.0 }
}

/// Move candidates of the tier preferred for `complexity` to the front,
/// keeping relative order on both sides.
pub fn prefer_tier(candidates: &mut Vec<Candidate>, complexity: u8) {
    let preferred = ModelTier::for_complexity(complexity);
    let (mut front, back): (Vec<_>, Vec<_>) = candidates
        .drain(..)
        .partition(|candidate| candidate.tier == preferred);
    front.extend(back);
    *candidates = front;
}

fn by_cost(left: &Candidate, right: &Candidate) -> Ordering {
    left.estimated_cost.total_cmp(&right.estimated_cost)
}

fn by_latency(left: &Candidate, right: &Candidate) -> Ordering {
    left.expected_latency_ms
        .total_cmp(&right.expected_latency_ms)
}
