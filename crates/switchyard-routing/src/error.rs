use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde::{Deserialize, Serialize};
use switchyard_core::{Error as CoreError, ErrorClass};
use thiserror::Error;

pub type Result<T> = StdResult<T, RoutingError>;

/// One failed provider attempt, kept in walk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub provider: String,
    pub model: String,
    pub class: ErrorClass,
    pub message: String,
}

impl Display for AttemptFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}: {}", self.provider, self.model, self.class)
    }
}

/// Why a (provider, model) pair was filtered out before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotPrivacySafe,
    CircuitOpen,
    CircuitHalfOpen,
    RateLimitCooldown,
    DailyBudgetExhausted,
    OverCostCeiling { estimated: f64, ceiling: f64 },
    OverLatencyCeiling { observed_ms: u64, ceiling_ms: u64 },
}

impl Display for RejectionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::NotPrivacySafe => write!(f, "not privacy safe"),
            Self::CircuitOpen => write!(f, "circuit open"),
            Self::CircuitHalfOpen => write!(f, "circuit half-open, awaiting probe"),
            Self::RateLimitCooldown => write!(f, "rate-limit cooldown"),
            Self::DailyBudgetExhausted => write!(f, "daily budget exhausted"),
            Self::OverCostCeiling {
                estimated,
                ceiling,
            } => write!(f, "estimated cost {estimated:.6} exceeds {ceiling:.6}"),
            Self::OverLatencyCeiling {
                observed_ms,
                ceiling_ms,
            } => write!(f, "latency {observed_ms}ms exceeds {ceiling_ms}ms"),
        }
    }
}

/// A (provider, model) pair removed by a hard constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub provider: String,
    pub model: String,
    pub reason: RejectionReason,
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}: {}", self.provider, self.model, self.reason)
    }
}

fn join_display<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        attempts: Vec<AttemptFailure>,
    },

    #[error("No eligible provider: [{}]", join_display(.rejections))]
    NoEligibleProvider { rejections: Vec<Rejection> },

    #[error("All providers failed: [{}]", join_display(.attempts))]
    AllProvidersFailed { attempts: Vec<AttemptFailure> },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

impl RoutingError {
    /// Ordered per-attempt failures carried by a terminal dispatch error.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            Self::InvalidRequest { attempts, .. } | Self::AllProvidersFailed { attempts } => {
                attempts
            }
            _ => &[],
        }
    }

    /// Whether this error ends a request and is written to the ledger.
    #[must_use]
    pub fn is_terminal_outcome(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::NoEligibleProvider { .. }
                | Self::AllProvidersFailed { .. }
        )
    }
}
