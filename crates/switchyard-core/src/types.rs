use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

/// Capability tag carried by models that may receive privacy-sensitive input.
pub const PRIVACY_SAFE_TAG: &str = "privacy_safe";

/// Where a provider runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Hosted API reached over the network
    Cloud,
    /// Self-hosted inference server on the local machine or network
    Local,
}

impl ProviderKind {
    /// Whether this provider runs on self-hosted hardware.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Cloud => write!(f, "cloud"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Capability tier of a model, used for complexity preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Low-cost or local models
    Economy,
    /// Mid-tier cloud models
    Standard,
    /// Top-tier capability-tagged models
    Premium,
}

impl ModelTier {
    /// Tier preferred for a complexity score.
    #[must_use]
    pub const fn for_complexity(complexity: u8) -> Self {
        match complexity {
            0..=3 => Self::Economy,
            4..=6 => Self::Standard,
            _ => Self::Premium,
        }
    }
}

impl Display for ModelTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Economy => write!(f, "Economy"),
            Self::Standard => write!(f, "Standard"),
            Self::Premium => write!(f, "Premium"),
        }
    }
}

/// A model served by a provider, with its pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier passed to the backend
    pub id: String,
    /// USD per 1k input tokens
    pub cost_in_per_1k: f64,
    /// USD per 1k output tokens
    pub cost_out_per_1k: f64,
    /// Capability tags such as `code_generation` or `reasoning`
    pub capability_tags: Vec<String>,
    /// Capability tier
    pub tier: ModelTier,
}

impl ModelSpec {
    /// Cost in USD for the given token counts.
    #[must_use]
    pub fn cost_for(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0)
            .mul_add(self.cost_in_per_1k, (output_tokens as f64 / 1000.0) * self.cost_out_per_1k)
    }

    /// Whether the model declares the given capability tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.capability_tags.iter().any(|candidate| candidate == tag)
    }

    /// Whether the model declares any of the given capability tags.
    #[must_use]
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.has_tag(tag))
    }
}

/// Static identity of a backend, created from configuration at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider identifier
    pub id: String,
    /// Cloud or local
    pub kind: ProviderKind,
    /// Models served by this provider
    pub models: Vec<ModelSpec>,
    /// Typical latency in milliseconds, used until calls are observed
    pub base_latency_ms: u64,
    /// Maximum number of in-flight calls
    pub max_concurrency: usize,
}

impl ProviderDescriptor {
    /// Look up a model by identifier.
    #[must_use]
    pub fn model(&self, model_id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|model| model.id == model_id)
    }

    /// Union of capability tags over every model.
    #[must_use]
    pub fn capability_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .models
            .iter()
            .flat_map(|model| model.capability_tags.iter().map(String::as_str))
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }
}

/// Normalized outcome of one successful completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Input tokens billed
    pub input_tokens: u64,
    /// Output tokens billed
    pub output_tokens: u64,
    /// Cost in USD
    pub cost: f64,
}

/// Result of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    /// Whether the backend answered successfully
    pub healthy: bool,
    /// Observed round-trip time
    pub latency: Duration,
}

/// Rough token estimate for text (four characters per token).
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}
