//! Core types and traits for the switchyard inference router.
//!
//! This crate provides the provider descriptors, the adapter contract every
//! backend implements, error handling, and the router configuration schema.

/// Router configuration schema, loading and validation.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Synchronization helpers.
pub mod sync;
/// Trait definitions for provider adapters.
pub mod traits;
/// Core data types for providers, models and completions.
pub mod types;

pub use config::{
    ApiKeys, Backend, BalancedWeights, CircuitBreakerConfig, EstimatorConfig, HealthConfig,
    LedgerConfig, ModelConfig, ProviderConfig, RouterConfig, Strategy, TimeoutConfig,
};
pub use error::{Error, ErrorClass, ProviderError, ProviderResult, Result};
pub use sync::IgnoreLock;
pub use traits::ProviderAdapter;
pub use types::{
    Completion, HealthReport, ModelSpec, ModelTier, PRIVACY_SAFE_TAG, ProviderDescriptor,
    ProviderKind, estimate_tokens,
};
