//! Per-provider health: circuit breaker state, latency averages and probing.

pub mod circuit;
pub mod monitor;

pub use circuit::{Availability, CircuitState, HealthSnapshot, ProbeAction, ProviderHealth};
pub use monitor::HealthMonitor;
