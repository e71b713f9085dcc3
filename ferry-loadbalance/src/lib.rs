//! Ferry Load Balance Library
//!
//! This library provides client-side load balancing over a pool of providers:
//! - Provider registry with a capacity bound
//! - Health probing with hysteresis and a background scheduler
//! - Admission control bounding concurrent calls
//! - Pluggable balancing strategies (random, round-robin)

pub mod loadbalance;

// Re-export commonly used types
pub use ferry_core::{LoadBalancerConfig, Provider, ProviderError, StrategyKind};
pub use loadbalance::{
    AdmissionGate, BalancingStrategy, HealthCheckScheduler, HealthStatus, LoadBalancer,
    LoadBalancerError, LoadBalancerResult, ProviderHealth, ProviderId, ProviderRegistry,
    RandomStrategy, RoundRobinStrategy, SharedProvider, SweepSummary,
};
