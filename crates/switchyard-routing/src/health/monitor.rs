use super::circuit::ProbeAction;
use crate::registry::{PoolEntry, ProviderPool};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::HealthConfig;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Periodic background prober, one task per provider.
///
/// Probing is independent of request traffic so an open circuit can recover
/// with no live calls. Dropping the monitor stops every task.
pub struct HealthMonitor {
    pool: Arc<ProviderPool>,
    probe_interval: Duration,
    probe_timeout: Duration,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl HealthMonitor {
    /// A monitor with no tasks running yet.
    pub fn new(pool: Arc<ProviderPool>, config: &HealthConfig) -> Self {
        Self {
            pool,
            probe_interval: config.probe_interval(),
            probe_timeout: config.probe_timeout(),
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Spawn one probing task per provider. Must run inside a Tokio runtime.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        for entry in self.pool.entries() {
            let entry = Arc::clone(entry);
            let token = self.token.child_token();
            let period = self.probe_interval;
            let timeout = self.probe_timeout;
            self.handles.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => probe_entry(&entry, timeout).await,
                    }
                }
            }));
        }
    }

    /// Run one probe round over every provider now.
    pub async fn probe_all(&self) {
        probe_pool(&self.pool, self.probe_timeout).await;
    }

    /// Stop all probing tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            if let Err(error) = handle.await {
                debug!(%error, "Health probe task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && !self.token.is_cancelled()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// One probe round over the whole pool.
pub async fn probe_pool(pool: &ProviderPool, timeout: Duration) {
    join_all(
        pool.entries()
            .iter()
            .map(|entry| probe_entry(entry, timeout)),
    )
    .await;
}

async fn probe_entry(entry: &PoolEntry, timeout: Duration) {
    if entry.health().begin_probe(Instant::now()) == ProbeAction::Skip {
        return;
    }
    let report = entry.adapter().health_check(timeout).await;
    debug!(
        provider = %entry.id(),
        healthy = report.healthy,
        latency_ms = report.latency.as_millis(),
        "Health probe"
    );
    entry.health().record_probe(report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::CircuitState;
    use switchyard_core::{
        ErrorClass, ModelSpec, ModelTier, ProviderAdapter, ProviderDescriptor, ProviderKind,
        RouterConfig,
    };
    use switchyard_providers::FakeProvider;
    use tokio::time::advance;

    fn fake() -> FakeProvider {
        FakeProvider::new(ProviderDescriptor {
            id: "a".to_owned(),
            kind: ProviderKind::Cloud,
            models: vec![ModelSpec {
                id: "a-1".to_owned(),
                cost_in_per_1k: 0.1,
                cost_out_per_1k: 0.1,
                capability_tags: Vec::new(),
                tier: ModelTier::Standard,
            }],
            base_latency_ms: 100,
            max_concurrency: 1,
        })
    }

    fn pool(fake: &FakeProvider) -> Arc<ProviderPool> {
        let adapter: Arc<dyn ProviderAdapter> = Arc::new(fake.clone());
        match ProviderPool::with_adapters(vec![adapter], &RouterConfig::default()) {
            Ok(pool) => Arc::new(pool),
            Err(error) => panic!("pool rejected: {error}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_not_probed_before_cooldown() {
        let fake = fake();
        let pool = pool(&fake);
        let monitor = HealthMonitor::new(Arc::clone(&pool), &HealthConfig::default());
        let health = pool.entries()[0].health();
        for _ in 0..3 {
            health.record_failure(ErrorClass::Unavailable);
        }

        monitor.probe_all().await;
        assert_eq!(fake.health_check_count(), 0);

        advance(Duration::from_secs(30)).await;
        monitor.probe_all().await;
        assert_eq!(fake.health_check_count(), 1);
        assert_eq!(health.circuit_state(), CircuitState::Closed);
    }

    async fn wait_for_probes(fake: &FakeProvider, expected: usize) {
        for _ in 0..16 {
            if fake.health_check_count() >= expected {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_probes_tick() {
        let fake = fake();
        let pool = pool(&fake);
        let mut monitor = HealthMonitor::new(pool, &HealthConfig::default());
        monitor.start();
        assert!(monitor.is_running());

        wait_for_probes(&fake, 1).await;
        assert_eq!(fake.health_check_count(), 0);

        advance(Duration::from_secs(30)).await;
        wait_for_probes(&fake, 1).await;
        assert_eq!(fake.health_check_count(), 1);

        advance(Duration::from_secs(30)).await;
        wait_for_probes(&fake, 2).await;
        assert_eq!(fake.health_check_count(), 2);

        monitor.shutdown().await;
    }
}
