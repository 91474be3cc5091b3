//! Inference routing: picks which LLM backend serves each request under cost,
//! latency, privacy and reliability constraints, falls back on failure, and
//! records usage.
//!
//! Data flow: request, complexity estimate, policy evaluation over the
//! provider pool, dispatch with fallback, usage record.

pub mod analyzer;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod ledger;
pub mod policy;
pub mod registry;
pub mod request;
pub mod router;

pub use analyzer::ComplexityEstimator;
pub use dispatcher::{DispatchSuccess, Dispatcher};
pub use error::{AttemptFailure, Rejection, RejectionReason, Result, RoutingError};
pub use health::{Availability, CircuitState, HealthMonitor, HealthSnapshot, ProviderHealth};
pub use ledger::{
    JsonlFileSink, RecordContext, UsageLedger, UsageOutcome, UsageRecord, UsageSink, UsageSummary,
};
pub use policy::{Candidate, PolicyEvaluator, RoutingDecision};
pub use registry::{PoolEntry, ProviderPool};
pub use request::{RouteOptions, RouteResponse, RoutingRequest};
pub use router::Router;
