//! Provider pool: one adapter per configured provider plus its health record
//! and concurrency limit.

use crate::health::{HealthSnapshot, ProviderHealth};
use crate::{Result, RoutingError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::{Backend, ProviderAdapter, ProviderConfig, ProviderDescriptor, RouterConfig};
use switchyard_local::LocalModelProvider;
use switchyard_providers::{GroqProvider, OpenRouterProvider};
use tokio::sync::Semaphore;
use tracing::info;

/// A provider adapter with its routing-side state.
pub struct PoolEntry {
    adapter: Arc<dyn ProviderAdapter>,
    health: ProviderHealth,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl PoolEntry {
    fn new(adapter: Arc<dyn ProviderAdapter>, config: &RouterConfig) -> Self {
        let descriptor = adapter.capabilities();
        let health = ProviderHealth::new(
            descriptor.id.clone(),
            descriptor.base_latency_ms,
            &config.circuit_breaker,
            config.health.latency_ema_alpha,
        );
        let permits = Arc::new(Semaphore::new(descriptor.max_concurrency.max(1)));
        let timeout = config.timeouts.for_kind(descriptor.kind);
        Self {
            adapter,
            health,
            permits,
            timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.adapter.capabilities().id
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        self.adapter.capabilities()
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    pub fn health(&self) -> &ProviderHealth {
        &self.health
    }

    /// Limits in-flight calls to `max_concurrency`.
    pub fn permits(&self) -> &Arc<Semaphore> {
        &self.permits
    }

    /// Per-attempt timeout for this provider's kind.
    pub const fn attempt_timeout(&self) -> Duration {
        self.timeout
    }
}

/// The set of providers a router chooses from, in configuration order.
pub struct ProviderPool {
    entries: Vec<Arc<PoolEntry>>,
}

impl ProviderPool {
    /// Build real adapters for every configured provider.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or a cloud provider
    /// has no API key.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let descriptors = config.descriptors()?;
        let adapters = config
            .providers
            .iter()
            .zip(descriptors)
            .map(|(provider, descriptor)| build_adapter(config, provider, descriptor))
            .collect::<Result<Vec<_>>>()?;

        let pool = Self::with_adapters(adapters, config)?;
        info!(providers = pool.len(), "Provider pool ready");
        Ok(pool)
    }

    /// Build a pool around pre-built adapters, e.g. fakes in tests.
    ///
    /// # Errors
    /// Returns an error on duplicate provider ids or unusable descriptors.
    pub fn with_adapters(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        config: &RouterConfig,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for adapter in &adapters {
            let descriptor = adapter.capabilities();
            if !seen.insert(descriptor.id.clone()) {
                return Err(RoutingError::Config(format!(
                    "duplicate provider id '{}'",
                    descriptor.id
                )));
            }
            if descriptor.models.is_empty() {
                return Err(RoutingError::Config(format!(
                    "provider '{}' declares no models",
                    descriptor.id
                )));
            }
            if descriptor.max_concurrency == 0 {
                return Err(RoutingError::Config(format!(
                    "provider '{}' has max_concurrency 0",
                    descriptor.id
                )));
            }
        }

        Ok(Self {
            entries: adapters
                .into_iter()
                .map(|adapter| Arc::new(PoolEntry::new(adapter, config)))
                .collect(),
        })
    }

    pub fn entries(&self) -> &[Arc<PoolEntry>] {
        &self.entries
    }

    pub fn get(&self, provider_id: &str) -> Option<&Arc<PoolEntry>> {
        self.entries.iter().find(|entry| entry.id() == provider_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Health of every provider, in pool order.
    pub fn health_snapshot(&self) -> Vec<HealthSnapshot> {
        self.entries
            .iter()
            .map(|entry| entry.health().snapshot())
            .collect()
    }
}

fn build_adapter(
    config: &RouterConfig,
    provider: &ProviderConfig,
    descriptor: ProviderDescriptor,
) -> Result<Arc<dyn ProviderAdapter>> {
    let missing_key = || {
        RoutingError::Config(format!(
            "provider '{}' needs an API key for {:?}",
            provider.id, provider.backend
        ))
    };

    let adapter: Arc<dyn ProviderAdapter> = match provider.backend {
        Backend::Groq => {
            let key = config.get_api_key(Backend::Groq).ok_or_else(missing_key)?;
            let adapter = GroqProvider::new(descriptor, key)?;
            Arc::new(match &provider.base_url {
                Some(url) => adapter.with_base_url(url.clone()),
                None => adapter,
            })
        }
        Backend::OpenRouter => {
            let key = config
                .get_api_key(Backend::OpenRouter)
                .ok_or_else(missing_key)?;
            let adapter = OpenRouterProvider::new(descriptor, key)?;
            Arc::new(match &provider.base_url {
                Some(url) => adapter.with_base_url(url.clone()),
                None => adapter,
            })
        }
        Backend::Ollama => {
            let adapter = LocalModelProvider::new(descriptor)
                .map_err(|error| RoutingError::Config(error.to_string()))?;
            Arc::new(match &provider.base_url {
                Some(url) => adapter.with_url(url.clone()),
                None => adapter,
            })
        }
    };
    Ok(adapter)
}
