pub mod admission;
pub mod balancer;
pub mod error;
pub mod health;
pub mod registry;
pub mod scheduler;
pub mod strategy;


pub use admission::{AdmissionGate, AdmissionPermit};
pub use balancer::LoadBalancer;
pub use error::{LoadBalancerError, LoadBalancerResult};
pub use health::{AtomicHealthStatus, HealthStatus};
pub use registry::{
    ProviderEntry, ProviderHealth, ProviderId, ProviderRegistry, SharedProvider, SweepSummary,
};
pub use scheduler::HealthCheckScheduler;
pub use strategy::{BalancingStrategy, RandomStrategy, RoundRobinStrategy};
