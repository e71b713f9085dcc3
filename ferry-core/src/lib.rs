//! Ferry Core Library
//!
//! This library provides core functionality for the Ferry load balancer including:
//! - The provider capability trait and its error type
//! - Configuration management

pub mod config;
pub mod provider;

// Re-export commonly used types
pub use config::model::{HealthCheckSettings, LoadBalancerConfig, StrategyKind};
pub use provider::{BoxError, Provider, ProviderError};
