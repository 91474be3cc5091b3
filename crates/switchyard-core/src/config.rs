//! Router configuration: providers, strategy defaults, breaker and ledger settings.
//!
//! Configuration is loaded once at startup. Anything malformed is fatal: the
//! router refuses to start rather than run with a partially understood setup.

use crate::types::{ModelSpec, ModelTier, PRIVACY_SAFE_TAG, ProviderDescriptor, ProviderKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Ranking strategy applied to surviving candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Cheapest first, then fastest
    CostOptimized,
    /// Fastest observed first, then cheapest
    PerformanceOptimized,
    /// Local providers first, cheapest within each group
    PrivacyFirst,
    /// Weighted blend of cost, latency and capability fit
    #[default]
    Balanced,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::CostOptimized => write!(f, "cost_optimized"),
            Self::PerformanceOptimized => write!(f, "performance_optimized"),
            Self::PrivacyFirst => write!(f, "privacy_first"),
            Self::Balanced => write!(f, "balanced"),
        }
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "cost_optimized" => Ok(Self::CostOptimized),
            "performance_optimized" => Ok(Self::PerformanceOptimized),
            "privacy_first" => Ok(Self::PrivacyFirst),
            "balanced" => Ok(Self::Balanced),
            other => Err(Error::Config(format!("Unknown strategy: {other}"))),
        }
    }
}

/// Adapter implementation used to reach a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Groq chat completions API
    Groq,
    /// `OpenRouter` chat completions API
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// Ollama inference server
    Ollama,
}

/// One model entry under a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Model identifier
    pub id: String,
    /// USD per 1k input tokens
    pub cost_in_per_1k: f64,
    /// USD per 1k output tokens
    pub cost_out_per_1k: f64,
    /// Capability tags
    #[serde(default)]
    pub capability_tags: Vec<String>,
    /// Explicit tier; derived from kind and tags when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<ModelTier>,
}

/// One configured provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique identifier
    pub id: String,
    /// Cloud or local
    pub kind: ProviderKind,
    /// Adapter used to reach it
    pub backend: Backend,
    /// Endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Typical latency in milliseconds
    #[serde(default = "default_base_latency_ms")]
    pub base_latency_ms: u64,
    /// Maximum in-flight calls
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Served models
    pub models: Vec<ModelConfig>,
}

const fn default_base_latency_ms() -> u64 {
    1000
}

const fn default_max_concurrency() -> usize {
    4
}

/// Circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before a recovery probe
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_seconds: 30,
        }
    }
}

impl CircuitBreakerConfig {
    /// Cooldown as a duration.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Background health probing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Seconds between probes of one provider
    pub probe_interval_seconds: u64,
    /// Timeout of a single probe in milliseconds
    pub probe_timeout_ms: u64,
    /// Smoothing factor of the rolling latency average
    pub latency_ema_alpha: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: 30,
            probe_timeout_ms: 5000,
            latency_ema_alpha: 0.3,
        }
    }
}

impl HealthConfig {
    /// Probe interval as a duration.
    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds)
    }

    /// Probe timeout as a duration.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Per-attempt timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Seconds allowed for one cloud attempt
    pub cloud_seconds: u64,
    /// Seconds allowed for one local attempt
    pub local_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            cloud_seconds: 30,
            local_seconds: 60,
        }
    }
}

impl TimeoutConfig {
    /// Attempt timeout for a provider kind.
    #[must_use]
    pub const fn for_kind(&self, kind: ProviderKind) -> Duration {
        match kind {
            ProviderKind::Cloud => Duration::from_secs(self.cloud_seconds),
            ProviderKind::Local => Duration::from_secs(self.local_seconds),
        }
    }
}

/// Complexity estimator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Starting score before adjustments
    pub base_score: i32,
    /// Word count above which the long-input bonus applies
    pub word_threshold: usize,
    /// Vocabulary that marks technical input (matched case-insensitively)
    pub technical_terms: Vec<String>,
    /// Leading words that mark a question
    pub interrogative_openers: Vec<String>,
    /// Regexes recognising short greetings (matched case-insensitively)
    pub greeting_patterns: Vec<String>,
    /// Minimum complexity implied by a task hint
    pub task_floors: BTreeMap<String, u8>,
    /// Complexity at which capability-tagged models are required
    pub high_complexity_threshold: u8,
    /// Tags that satisfy the high-complexity requirement
    pub high_complexity_tags: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        let task_floors = [
            ("code_generation", 7),
            ("reasoning", 7),
            ("analysis", 5),
            ("summarization", 4),
            ("chat", 1),
        ]
        .into_iter()
        .map(|(hint, floor)| (hint.to_owned(), floor))
        .collect();

        Self {
            base_score: 3,
            word_threshold: 50,
            technical_terms: strings(&[
                "algorithm",
                "architecture",
                "database",
                "security",
                "concurrency",
                "distributed",
                "compiler",
                "kubernetes",
                "optimize",
                "refactor",
                "```",
            ]),
            interrogative_openers: strings(&[
                "what", "why", "how", "when", "where", "who", "which", "can", "could", "would",
                "should", "is", "are", "does", "do",
            ]),
            greeting_patterns: strings(&[
                r"^\s*(hi|hello|hey|yo|howdy)\b",
                r"^\s*(thanks|thank you|thx|cheers)\b",
                r"^\s*good (morning|afternoon|evening)\b",
            ]),
            task_floors,
            high_complexity_threshold: 7,
            high_complexity_tags: strings(&["reasoning", "code_generation"]),
        }
    }
}

/// Weights of the balanced strategy score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BalancedWeights {
    /// Weight of normalized cost
    pub cost_weight: f64,
    /// Weight of normalized latency
    pub latency_weight: f64,
    /// Weight of capability mismatch
    pub capability_weight: f64,
}

impl Default for BalancedWeights {
    fn default() -> Self {
        Self {
            cost_weight: 0.5,
            latency_weight: 0.3,
            capability_weight: 0.2,
        }
    }
}

/// Usage ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Records held for the sink before the oldest are dropped
    pub buffer_capacity: usize,
    /// Milliseconds between sink flushes
    pub flush_interval_ms: u64,
    /// Hours of records kept in memory for summaries and budgeting
    pub retention_hours: u64,
    /// JSON-lines file the ledger appends to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024,
            flush_interval_ms: 1000,
            retention_hours: 168,
            path: None,
        }
    }
}

/// API keys for cloud providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiKeys {
    /// Groq API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groq: Option<String>,
    /// `OpenRouter` API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openrouter: Option<String>,
}

/// Complete router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Strategy used when a request does not override it
    pub strategy_default: Strategy,
    /// Rolling 24h spend ceiling in USD; cloud providers are excluded once reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_cost_budget: Option<f64>,
    /// Longest candidate list, bounding fallback depth
    pub max_candidates: usize,
    /// Output tokens assumed when estimating a request's cost
    pub expected_output_tokens: u64,
    /// Race the top two candidates when a request prefers latency over cost
    pub hedge_when_latency_preferred: bool,
    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,
    /// Health probe settings
    pub health: HealthConfig,
    /// Per-attempt timeouts
    pub timeouts: TimeoutConfig,
    /// Complexity estimator tuning
    pub estimator: EstimatorConfig,
    /// Balanced strategy weights
    pub balanced: BalancedWeights,
    /// Usage ledger settings
    pub ledger: LedgerConfig,
    /// Cloud API keys
    pub api_keys: ApiKeys,
    /// Configured providers
    pub providers: Vec<ProviderConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy_default: Strategy::default(),
            daily_cost_budget: None,
            max_candidates: 3,
            expected_output_tokens: 256,
            hedge_when_latency_preferred: true,
            circuit_breaker: CircuitBreakerConfig::default(),
            health: HealthConfig::default(),
            timeouts: TimeoutConfig::default(),
            estimator: EstimatorConfig::default(),
            balanced: BalancedWeights::default(),
            ledger: LedgerConfig::default(),
            api_keys: ApiKeys::default(),
            providers: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Get the default config directory path (`~/.switchyard`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".switchyard"))
    }

    /// Get the default config file path (`~/.switchyard/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or defaults when no file exists.
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read, parsed or validated
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        tracing::debug!(
            "Loaded config from {:?}: {} providers, strategy={}, groq_key={}, openrouter_key={}",
            path,
            config.providers.len(),
            config.strategy_default,
            if config.api_keys.groq.is_some() {
                "present"
            } else {
                "missing"
            },
            if config.api_keys.openrouter.is_some() {
                "present"
            } else {
                "missing"
            }
        );

        Ok(config)
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    /// Returns an error on unknown fields, type mismatches or failed validation
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Switchyard router configuration\n\
                      # Providers, strategy and budget are read once at startup\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Get API key for a backend, checking config first, then environment variables
    pub fn get_api_key(&self, backend: Backend) -> Option<String> {
        match backend {
            Backend::Groq => self
                .api_keys
                .groq
                .clone()
                .or_else(|| env::var("GROQ_API_KEY").ok()),
            Backend::OpenRouter => self
                .api_keys
                .openrouter
                .clone()
                .or_else(|| env::var("OPENROUTER_API_KEY").ok()),
            Backend::Ollama => None,
        }
    }

    /// Reject configurations the router cannot run with.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.max_candidates == 0 {
            return Err(config_error("max_candidates must be at least 1"));
        }
        if let Some(budget) = self.daily_cost_budget
            && (!budget.is_finite() || budget < 0.0)
        {
            return Err(config_error(format!(
                "daily_cost_budget must be a non-negative number, got {budget}"
            )));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(config_error("circuit_breaker.failure_threshold must be at least 1"));
        }
        let alpha = self.health.latency_ema_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(config_error(format!(
                "health.latency_ema_alpha must be in (0, 1], got {alpha}"
            )));
        }
        if self.health.probe_interval_seconds == 0 {
            return Err(config_error("health.probe_interval_seconds must be at least 1"));
        }
        if self.ledger.buffer_capacity == 0 {
            return Err(config_error("ledger.buffer_capacity must be at least 1"));
        }
        self.validate_weights()?;
        self.validate_estimator()?;
        self.validate_providers()
    }

    fn validate_weights(&self) -> Result<()> {
        let weights = [
            ("cost_weight", self.balanced.cost_weight),
            ("latency_weight", self.balanced.latency_weight),
            ("capability_weight", self.balanced.capability_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(config_error(format!(
                    "balanced.{name} must be a non-negative number, got {weight}"
                )));
            }
        }
        if weights.iter().all(|(_, weight)| *weight == 0.0) {
            return Err(config_error("balanced weights cannot all be zero"));
        }
        Ok(())
    }

    fn validate_estimator(&self) -> Result<()> {
        let estimator = &self.estimator;
        for (hint, floor) in &estimator.task_floors {
            if !(1..=10).contains(floor) {
                return Err(config_error(format!(
                    "estimator.task_floors.{hint} must be within 1..=10, got {floor}"
                )));
            }
        }
        if !(1..=10).contains(&estimator.high_complexity_threshold) {
            return Err(config_error(format!(
                "estimator.high_complexity_threshold must be within 1..=10, got {}",
                estimator.high_complexity_threshold
            )));
        }
        Ok(())
    }

    fn validate_providers(&self) -> Result<()> {
        let mut provider_ids = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(config_error("provider id cannot be empty"));
            }
            if !provider_ids.insert(provider.id.as_str()) {
                return Err(config_error(format!("duplicate provider id: {}", provider.id)));
            }
            if provider.models.is_empty() {
                return Err(config_error(format!("provider {} declares no models", provider.id)));
            }
            if provider.max_concurrency == 0 {
                return Err(config_error(format!(
                    "provider {} max_concurrency must be at least 1",
                    provider.id
                )));
            }

            let mut model_ids = HashSet::new();
            for model in &provider.models {
                if model.id.trim().is_empty() {
                    return Err(config_error(format!(
                        "provider {} has a model with an empty id",
                        provider.id
                    )));
                }
                if !model_ids.insert(model.id.as_str()) {
                    return Err(config_error(format!(
                        "provider {} declares model {} twice",
                        provider.id, model.id
                    )));
                }
                for (field, cost) in [
                    ("cost_in_per_1k", model.cost_in_per_1k),
                    ("cost_out_per_1k", model.cost_out_per_1k),
                ] {
                    if !cost.is_finite() || cost < 0.0 {
                        return Err(config_error(format!(
                            "provider {} model {} has invalid {field}: {cost}",
                            provider.id, model.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the immutable provider descriptors.
    ///
    /// Local providers implicitly carry the `privacy_safe` tag on every model.
    ///
    /// # Errors
    /// Returns an error if the configuration fails validation
    pub fn descriptors(&self) -> Result<Vec<ProviderDescriptor>> {
        self.validate()?;
        Ok(self
            .providers
            .iter()
            .map(|provider| self.descriptor_for(provider))
            .collect())
    }

    fn descriptor_for(&self, provider: &ProviderConfig) -> ProviderDescriptor {
        let models = provider
            .models
            .iter()
            .map(|model| {
                let mut capability_tags = model.capability_tags.clone();
                if provider.kind.is_local() && !capability_tags.iter().any(|tag| tag == PRIVACY_SAFE_TAG)
                {
                    capability_tags.push(PRIVACY_SAFE_TAG.to_owned());
                }
                let tier = model.tier.unwrap_or_else(|| {
                    if provider.kind.is_local() {
                        ModelTier::Economy
                    } else if capability_tags
                        .iter()
                        .any(|tag| self.estimator.high_complexity_tags.contains(tag))
                    {
                        ModelTier::Premium
                    } else {
                        ModelTier::Standard
                    }
                });
                ModelSpec {
                    id: model.id.clone(),
                    cost_in_per_1k: model.cost_in_per_1k,
                    cost_out_per_1k: model.cost_out_per_1k,
                    capability_tags,
                    tier,
                }
            })
            .collect();

        ProviderDescriptor {
            id: provider.id.clone(),
            kind: provider.kind,
            models,
            base_latency_ms: provider.base_latency_ms,
            max_concurrency: provider.max_concurrency,
        }
    }

    /// Look up a provider's configuration by id.
    pub fn provider(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|provider| provider.id == provider_id)
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
strategy_default = "cost_optimized"
daily_cost_budget = 5.0

[circuit_breaker]
failure_threshold = 4
cooldown_seconds = 10

[[providers]]
id = "ollama"
kind = "local"
backend = "ollama"
base_latency_ms = 900

[[providers.models]]
id = "qwen2.5-coder:7b"
cost_in_per_1k = 0.0
cost_out_per_1k = 0.0
capability_tags = ["code_generation"]

[[providers]]
id = "groq"
kind = "cloud"
backend = "groq"
base_latency_ms = 300

[[providers.models]]
id = "llama-3.1-8b-instant"
cost_in_per_1k = 0.00005
cost_out_per_1k = 0.00008

[[providers.models]]
id = "llama-3.3-70b-versatile"
cost_in_per_1k = 0.00059
cost_out_per_1k = 0.00079
capability_tags = ["reasoning"]
"#;

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.strategy_default, Strategy::Balanced);
        assert_eq!(config.max_candidates, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.timeouts.for_kind(ProviderKind::Cloud), Duration::from_secs(30));
        assert_eq!(config.timeouts.for_kind(ProviderKind::Local), Duration::from_secs(60));
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_sample() {
        let config = RouterConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.strategy_default, Strategy::CostOptimized);
        assert_eq!(config.daily_cost_budget, Some(5.0));
        assert_eq!(config.circuit_breaker.failure_threshold, 4);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].max_concurrency, 4);
    }

    #[test]
    fn test_descriptors_tag_local_models_privacy_safe() {
        let config = RouterConfig::from_toml_str(SAMPLE).unwrap();
        let descriptors = config.descriptors().unwrap();

        let local = &descriptors[0];
        assert_eq!(local.kind, ProviderKind::Local);
        assert!(local.models[0].has_tag(PRIVACY_SAFE_TAG));
        assert_eq!(local.models[0].tier, ModelTier::Economy);

        let cloud = &descriptors[1];
        assert!(!cloud.models[0].has_tag(PRIVACY_SAFE_TAG));
        assert_eq!(cloud.models[0].tier, ModelTier::Standard);
        assert_eq!(cloud.models[1].tier, ModelTier::Premium);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let toml = format!("{SAMPLE}\n[mystery]\nvalue = 1\n");
        let error = RouterConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(error, Error::Toml(_)));
    }

    #[test]
    fn test_rejects_unknown_provider_kind() {
        let toml = SAMPLE.replace("kind = \"local\"", "kind = \"edge\"");
        RouterConfig::from_toml_str(&toml).unwrap_err();
    }

    #[test]
    fn test_rejects_duplicate_provider_ids() {
        let toml = SAMPLE.replace("id = \"groq\"", "id = \"ollama\"");
        let error = RouterConfig::from_toml_str(&toml).unwrap_err();
        assert!(error.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn test_rejects_negative_costs() {
        let toml = SAMPLE.replace("cost_in_per_1k = 0.00005", "cost_in_per_1k = -0.1");
        let error = RouterConfig::from_toml_str(&toml).unwrap_err();
        assert!(error.to_string().contains("invalid cost_in_per_1k"));
    }

    #[test]
    fn test_rejects_duplicate_models() {
        let toml = SAMPLE.replace("llama-3.3-70b-versatile", "llama-3.1-8b-instant");
        let error = RouterConfig::from_toml_str(&toml).unwrap_err();
        assert!(error.to_string().contains("twice"));
    }

    #[test]
    fn test_rejects_zero_weights() {
        let mut config = RouterConfig::default();
        config.balanced = BalancedWeights {
            cost_weight: 0.0,
            latency_weight: 0.0,
            capability_weight: 0.0,
        };
        config.validate().unwrap_err();
    }

    #[test]
    fn test_rejects_bad_task_floor() {
        let mut config = RouterConfig::default();
        config.estimator.task_floors.insert("code_generation".to_owned(), 11);
        config.validate().unwrap_err();
    }

    #[test]
    fn test_strategy_round_trip_names() {
        for strategy in [
            Strategy::CostOptimized,
            Strategy::PerformanceOptimized,
            Strategy::PrivacyFirst,
            Strategy::Balanced,
        ] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
        "fastest".parse::<Strategy>().unwrap_err();
    }

    #[test]
    fn test_load_and_save_file() -> anyhow::Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(SAMPLE.as_bytes())?;

        let config = RouterConfig::load_from_file(temp_file.path())?;
        assert_eq!(config.providers.len(), 2);

        let dir = tempfile::tempdir()?;
        let saved_path = dir.path().join("nested").join("config.toml");
        config.save_to_file(&saved_path)?;
        let reloaded = RouterConfig::load_from_file(&saved_path)?;
        assert_eq!(reloaded, config);
        Ok(())
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = RouterConfig::default();
        config.api_keys.groq = Some("test_groq_key".to_owned());
        assert_eq!(config.get_api_key(Backend::Groq), Some("test_groq_key".to_owned()));
        assert_eq!(config.get_api_key(Backend::Ollama), None);
    }
}
