//! Routing policy: hard-constraint filtering and strategy ranking.

pub mod evaluator;
pub mod strategies;

pub use evaluator::{Candidate, PolicyEvaluator, RoutingDecision};
