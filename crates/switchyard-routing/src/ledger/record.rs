use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::{ErrorClass, Strategy};
use uuid::Uuid;

/// Terminal outcome of one routed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageOutcome {
    Success,
    NoEligibleProvider,
    InvalidRequest,
    AllProvidersFailed,
}

/// Append-only fact about one routed request. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique record id
    pub id: Uuid,
    /// Tracing id of the request
    pub correlation_id: String,
    /// When the outcome was reached
    pub timestamp: DateTime<Utc>,
    /// Provider that answered, or the last one tried on failure
    pub provider: Option<String>,
    /// Model that answered, or the last one tried on failure
    pub model: Option<String>,
    /// Billed input tokens; zero on failure
    pub input_tokens: u64,
    /// Billed output tokens; zero on failure
    pub output_tokens: u64,
    /// Actual cost in USD; zero on failure
    pub cost: f64,
    /// Wall time of the routed call
    pub latency_ms: u64,
    /// Whether a response reached the caller
    pub success: bool,
    /// Terminal outcome
    pub outcome: UsageOutcome,
    /// Class of the last failed attempt, if the request failed
    pub error_class: Option<ErrorClass>,
    /// Number of provider calls made
    pub attempts: u32,
    /// Strategy used for ranking
    pub strategy: Strategy,
    /// Complexity score of the request
    pub complexity: u8,
}

/// Fields shared by every record of one request.
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub correlation_id: String,
    pub strategy: Strategy,
    pub complexity: u8,
    pub latency_ms: u64,
}

impl UsageRecord {
    fn base(context: RecordContext, outcome: UsageOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: context.correlation_id,
            timestamp: Utc::now(),
            provider: None,
            model: None,
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            latency_ms: context.latency_ms,
            success: outcome == UsageOutcome::Success,
            outcome,
            error_class: None,
            attempts: 0,
            strategy: context.strategy,
            complexity: context.complexity,
        }
    }

    /// A request answered by `provider`/`model`.
    pub fn success(
        context: RecordContext,
        provider: &str,
        model: &str,
        tokens: (u64, u64),
        cost: f64,
        attempts: u32,
    ) -> Self {
        Self {
            provider: Some(provider.to_owned()),
            model: Some(model.to_owned()),
            input_tokens: tokens.0,
            output_tokens: tokens.1,
            cost,
            attempts,
            ..Self::base(context, UsageOutcome::Success)
        }
    }

    /// A request that ended without a response. Attributes no cost.
    pub fn failure(
        context: RecordContext,
        outcome: UsageOutcome,
        last_attempt: Option<(&str, &str, ErrorClass)>,
        attempts: u32,
    ) -> Self {
        let mut record = Self::base(context, outcome);
        record.attempts = attempts;
        if let Some((provider, model, class)) = last_attempt {
            record.provider = Some(provider.to_owned());
            record.model = Some(model.to_owned());
            record.error_class = Some(class);
        } else if outcome == UsageOutcome::InvalidRequest {
            record.error_class = Some(ErrorClass::InvalidRequest);
        }
        record
    }

    /// Override the timestamp, e.g. when restoring history.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RecordContext {
        RecordContext {
            correlation_id: "req-1".to_owned(),
            strategy: Strategy::Balanced,
            complexity: 4,
            latency_ms: 120,
        }
    }

    #[test]
    fn test_failure_attributes_no_cost() {
        let record = UsageRecord::failure(
            context(),
            UsageOutcome::AllProvidersFailed,
            Some(("groq", "llama", ErrorClass::Unavailable)),
            3,
        );
        assert!(!record.success);
        assert!(record.cost.abs() < f64::EPSILON);
        assert_eq!(record.input_tokens + record.output_tokens, 0);
        assert_eq!(record.error_class, Some(ErrorClass::Unavailable));
        assert_eq!(record.provider.as_deref(), Some("groq"));
    }

    #[test]
    fn test_invalid_request_class() {
        let record = UsageRecord::failure(context(), UsageOutcome::InvalidRequest, None, 0);
        assert_eq!(record.error_class, Some(ErrorClass::InvalidRequest));
        assert!(record.provider.is_none());
    }

    #[test]
    fn test_record_json_shape() {
        let record = UsageRecord::success(context(), "local", "llama3.2:3b", (10, 20), 0.0, 1);
        let json = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(error) => panic!("serialize failed: {error}"),
        };
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["strategy"], "balanced");
        assert_eq!(json["provider"], "local");
        assert!(json["error_class"].is_null());
    }
}
