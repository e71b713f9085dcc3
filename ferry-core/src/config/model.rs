use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::time::Duration;

/// 负载均衡器配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoadBalancerConfig {
    /// 最多可注册的provider数量
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// 每个活跃provider允许的并发调用数，未设置表示不限制
    #[serde(default)]
    pub simultaneous_call_single_provider_limit: Option<NonZeroUsize>,
    #[serde(default)]
    pub health_check: HealthCheckSettings,
}

/// 后台健康检查配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthCheckSettings {
    #[serde(default = "default_health_check_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,
}

/// 负载均衡策略
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// 均匀随机选择（默认）
    #[default]
    Random,
    /// 轮询
    RoundRobin,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            strategy: StrategyKind::default(),
            simultaneous_call_single_provider_limit: None,
            health_check: HealthCheckSettings::default(),
        }
    }
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_health_check_interval(),
            stop_timeout_ms: default_stop_timeout(),
        }
    }
}

impl HealthCheckSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

// Default value functions
fn default_capacity() -> usize {
    10
}

fn default_health_check_interval() -> u64 {
    5_000
}

fn default_stop_timeout() -> u64 {
    1_000
}

impl LoadBalancerConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            anyhow::bail!("capacity must be a positive number of providers");
        }

        if self.health_check.interval_ms == 0 {
            anyhow::bail!("health_check.interval_ms cannot be 0");
        }

        Ok(())
    }
}
