//! Inbound request and response types of the routing boundary.

use crate::error::{AttemptFailure, Result, RoutingError};
use serde::{Deserialize, Serialize};
use switchyard_core::Strategy;
use uuid::Uuid;

/// Caller-declared options for one routed call.
///
/// Every field defaults to "unconstrained".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOptions {
    /// Declared task type, e.g. `code_generation`
    pub task_hint: Option<String>,
    /// Restrict routing to `privacy_safe` models
    pub privacy_sensitive: bool,
    /// Maximum acceptable cost in USD
    pub max_cost: Option<f64>,
    /// Maximum acceptable latency in milliseconds
    pub max_latency_ms: Option<u64>,
    /// Strategy replacing the configured default
    pub strategy_override: Option<Strategy>,
    /// Latency matters more than cost; enables hedged dispatch
    pub prefer_latency: bool,
    /// Tracing id; generated when absent
    pub correlation_id: Option<String>,
}

impl RouteOptions {
    #[must_use]
    pub fn with_task_hint(mut self, hint: impl Into<String>) -> Self {
        self.task_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub const fn with_privacy_sensitive(mut self, sensitive: bool) -> Self {
        self.privacy_sensitive = sensitive;
        self
    }

    #[must_use]
    pub const fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    #[must_use]
    pub const fn with_max_latency_ms(mut self, max_latency_ms: u64) -> Self {
        self.max_latency_ms = Some(max_latency_ms);
        self
    }

    #[must_use]
    pub const fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy_override = Some(strategy);
        self
    }

    #[must_use]
    pub const fn with_prefer_latency(mut self, prefer_latency: bool) -> Self {
        self.prefer_latency = prefer_latency;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// One inference call to be routed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRequest {
    /// Prompt text
    pub text: String,
    /// Caller options
    pub options: RouteOptions,
    /// Resolved tracing id
    pub correlation_id: String,
}

impl RoutingRequest {
    /// Build a request, assigning a correlation id when the caller gave none.
    pub fn new(text: impl Into<String>, options: RouteOptions) -> Self {
        let correlation_id = options
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            text: text.into(),
            options,
            correlation_id,
        }
    }

    /// Reject requests no provider could ever serve.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for empty text or malformed ceilings.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(invalid("request text is empty"));
        }
        if let Some(max_cost) = self.options.max_cost
            && (!max_cost.is_finite() || max_cost < 0.0)
        {
            return Err(invalid(format!("max_cost must be a non-negative number, got {max_cost}")));
        }
        if self.options.max_latency_ms == Some(0) {
            return Err(invalid("max_latency_ms must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> RoutingError {
    RoutingError::InvalidRequest {
        message: message.into(),
        attempts: Vec::new(),
    }
}

/// Successful outcome of a routed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Completion text
    pub text: String,
    /// Provider that answered
    pub provider_used: String,
    /// Model that answered; differs from the top candidate after a fallback
    pub model_used: String,
    /// Actual cost in USD
    pub cost: f64,
    /// Wall time of the whole routed call
    pub latency_ms: u64,
    /// Billed input tokens
    pub input_tokens: u64,
    /// Billed output tokens
    pub output_tokens: u64,
    /// Index of the answering candidate in the ranked list
    pub fallback_depth: usize,
    /// Failed attempts that preceded the answer
    pub attempts: Vec<AttemptFailure>,
    /// Complexity score computed for the request
    pub complexity: u8,
    /// Strategy used for ranking
    pub strategy: Strategy,
    /// Tracing id
    pub correlation_id: String,
}

impl RouteResponse {
    /// Whether a lower-ranked candidate answered.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.fallback_depth > 0
    }
}
