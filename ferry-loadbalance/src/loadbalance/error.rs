use ferry_core::ProviderError;
use std::time::Duration;
use thiserror::Error;

use super::registry::ProviderId;

/// 负载均衡器对调用方暴露的错误
#[derive(Error, Debug)]
pub enum LoadBalancerError {
    /// 注册数量已达上限，本次注册没有生效
    #[error("can't register more than {capacity} providers")]
    CapacityExceeded { capacity: usize },

    /// 没有处于健康状态的provider
    #[error("no active providers")]
    NoActiveProviders,

    /// 并发调用数已达集群上限，由调用方决定重试策略
    #[error("cluster capacity exceeded: {in_flight} calls in flight, limit is {limit}")]
    ClusterCapacityExceeded { in_flight: usize, limit: usize },

    /// 被选中的provider返回了错误
    #[error("provider {provider} failed: {source}")]
    UnderlyingProviderError {
        provider: ProviderId,
        #[source]
        source: ProviderError,
    },

    #[error("health checking is already running")]
    AlreadyRunning,

    #[error("health check period must be greater than zero")]
    InvalidHealthCheckPeriod,

    /// 停止超时，后台任务已被强制中止
    #[error("health checking did not stop within {timeout:?}")]
    HealthCheckStopTimedOut { timeout: Duration },

    /// 后台任务异常退出（例如provider的 `probe` panic）
    #[error("health check task failed: {0}")]
    HealthCheckTaskFailed(#[source] tokio::task::JoinError),

    /// 自定义策略返回了越界的下标
    #[error("balancing strategy selected index {index} out of {active} active providers")]
    InvalidSelection { index: usize, active: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type LoadBalancerResult<T> = Result<T, LoadBalancerError>;
