//! Common test utilities for switchyard-routing tests
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use std::env;
use std::sync::{Arc, Once};
use switchyard_core::{
    ModelSpec, ModelTier, PRIVACY_SAFE_TAG, ProviderAdapter, ProviderDescriptor, ProviderKind,
    RouterConfig,
};
use switchyard_providers::FakeProvider;
use switchyard_routing::{ProviderPool, Router, UsageLedger};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests (idempotent).
/// Honors `RUST_LOG` if set, otherwise defaults to "debug".
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_owned());
        if fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init()
            .is_err()
        {
            // tracing already initialized in this process
        }
    });
}

/// Descriptor with a single model priced at `cost` per 1k tokens both ways.
pub fn descriptor(
    id: &str,
    kind: ProviderKind,
    base_latency_ms: u64,
    cost: f64,
    tags: &[&str],
    tier: ModelTier,
) -> ProviderDescriptor {
    let mut capability_tags: Vec<String> = tags.iter().map(|tag| (*tag).to_owned()).collect();
    if kind.is_local() && !capability_tags.iter().any(|tag| tag == PRIVACY_SAFE_TAG) {
        capability_tags.push(PRIVACY_SAFE_TAG.to_owned());
    }
    ProviderDescriptor {
        id: id.to_owned(),
        kind,
        models: vec![ModelSpec {
            id: format!("{id}-model"),
            cost_in_per_1k: cost,
            cost_out_per_1k: cost,
            capability_tags,
            tier,
        }],
        base_latency_ms,
        max_concurrency: 4,
    }
}

/// Local economy provider: free, slow, privacy safe.
pub fn local_fake() -> FakeProvider {
    FakeProvider::new(descriptor(
        "local",
        ProviderKind::Local,
        1500,
        0.0,
        &[],
        ModelTier::Economy,
    ))
}

/// Mid-tier cloud provider: cheap and fast, no capability tags.
pub fn mid_fake() -> FakeProvider {
    FakeProvider::new(descriptor(
        "mid",
        ProviderKind::Cloud,
        600,
        0.0005,
        &[],
        ModelTier::Standard,
    ))
}

/// Top-tier cloud provider tagged for reasoning and code generation.
pub fn top_fake() -> FakeProvider {
    FakeProvider::new(descriptor(
        "top",
        ProviderKind::Cloud,
        900,
        0.01,
        &["reasoning", "code_generation"],
        ModelTier::Premium,
    ))
}

/// Build a pool from fakes, in the given order.
pub fn pool(config: &RouterConfig, fakes: &[&FakeProvider]) -> ProviderPool {
    let adapters: Vec<Arc<dyn ProviderAdapter>> = fakes
        .iter()
        .map(|fake| Arc::new((*fake).clone()) as Arc<dyn ProviderAdapter>)
        .collect();
    match ProviderPool::with_adapters(adapters, config) {
        Ok(pool) => pool,
        Err(error) => panic!("pool rejected: {error}"),
    }
}

/// Router over `fakes` with an in-memory ledger.
pub fn router(config: &RouterConfig, fakes: &[&FakeProvider]) -> Router {
    match Router::new(config, pool(config, fakes)) {
        Ok(router) => router,
        Err(error) => panic!("router rejected: {error}"),
    }
}

/// Router over `fakes` sharing an existing ledger.
pub fn router_with_ledger(
    config: &RouterConfig,
    fakes: &[&FakeProvider],
    ledger: Arc<UsageLedger>,
) -> Router {
    match Router::with_ledger(config, pool(config, fakes), ledger) {
        Ok(router) => router,
        Err(error) => panic!("router rejected: {error}"),
    }
}

/// Standard three-provider fixture: local, mid and top.
pub struct Fixture {
    pub router: Router,
    pub local: FakeProvider,
    pub mid: FakeProvider,
    pub top: FakeProvider,
}

impl Fixture {
    pub fn new(config: &RouterConfig) -> Self {
        let local = local_fake();
        let mid = mid_fake();
        let top = top_fake();
        let router = router(config, &[&local, &mid, &top]);
        Self {
            router,
            local,
            mid,
            top,
        }
    }

    /// Total provider calls across the fixture.
    pub fn total_calls(&self) -> usize {
        self.local.call_count() + self.mid.call_count() + self.top.call_count()
    }
}

/// A prompt of `words` filler words.
pub fn long_prompt(words: usize) -> String {
    (0..words)
        .map(|index| format!("word{index}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serve an Ollama-style "model not found" 404 to every connection.
/// Returns the base URL of the listener.
pub async fn missing_model_server() -> String {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(error) => panic!("bind failed: {error}"),
    };
    let address = match listener.local_addr() {
        Ok(address) => address,
        Err(error) => panic!("no local address: {error}"),
    };
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buffer = vec![0_u8; 8192];
                if socket.read(&mut buffer).await.is_err() {
                    return;
                }
                let body = r#"{"error":"model not found, try pulling it first"}"#;
                let response = format!(
                    "HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                if socket.write_all(response.as_bytes()).await.is_ok() {
                    socket.shutdown().await.ok();
                }
            });
        }
    });
    format!("http://{address}")
}
