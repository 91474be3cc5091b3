use core::result::Result as CoreResult;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Result type for provider adapter calls.
pub type ProviderResult<T> = CoreResult<T, ProviderError>;

/// Errors that can occur in the core library.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

/// Classification of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connection failure or timeout
    Unavailable,
    /// Provider throttled the call
    RateLimited,
    /// The request itself was rejected; retrying elsewhere will not help
    InvalidRequest,
    /// Provider-side failure
    ProviderInternal,
    /// A completed call broke a caller constraint and was discarded
    PolicyViolation,
}

impl ErrorClass {
    /// Whether the next candidate should be tried after this failure.
    #[must_use]
    pub const fn is_fallback_eligible(self) -> bool {
        !matches!(self, Self::InvalidRequest)
    }

    /// Whether this failure reflects on the provider's health.
    #[must_use]
    pub const fn affects_health(self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::RateLimited | Self::ProviderInternal
        )
    }
}

impl Display for ErrorClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::ProviderInternal => write!(f, "provider_internal"),
            Self::PolicyViolation => write!(f, "policy_violation"),
        }
    }
}

/// Error returned by a provider adapter.
#[derive(Debug, Clone, Error)]
#[error("{class}: {message}")]
pub struct ProviderError {
    /// Failure class driving fallback and health decisions
    pub class: ErrorClass,
    /// Human-readable detail
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error of the given class.
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// Connection failure or timeout.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unavailable, message)
    }

    /// Throttled by the provider.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::RateLimited, message)
    }

    /// Request rejected as malformed.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidRequest, message)
    }

    /// Provider-side failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::ProviderInternal, message)
    }
}
