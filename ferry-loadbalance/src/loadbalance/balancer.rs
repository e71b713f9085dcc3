use ferry_core::LoadBalancerConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::admission::AdmissionGate;
use super::error::{LoadBalancerError, LoadBalancerResult};
use super::registry::{
    ProviderHealth, ProviderId, ProviderRegistry, SharedProvider, SweepSummary,
};
use super::scheduler::HealthCheckScheduler;
use super::strategy::{self, BalancingStrategy};

/// 负载均衡器
///
/// 整合注册表、准入控制、均衡策略和后台健康检查，提供统一的调用入口
pub struct LoadBalancer<R> {
    registry: Arc<ProviderRegistry<R>>,
    gate: AdmissionGate,
    strategy: Mutex<Box<dyn BalancingStrategy>>,
    scheduler: HealthCheckScheduler<R>,
}

impl<R: Send + 'static> LoadBalancer<R> {
    /// 按配置创建负载均衡器
    pub fn new(config: &LoadBalancerConfig) -> LoadBalancerResult<Self> {
        Self::with_strategy(config, strategy::from_kind(config.strategy))
    }

    /// 使用外部提供的均衡策略创建负载均衡器，忽略配置中的策略类型
    pub fn with_strategy(
        config: &LoadBalancerConfig,
        strategy: Box<dyn BalancingStrategy>,
    ) -> LoadBalancerResult<Self> {
        config
            .validate()
            .map_err(|e| LoadBalancerError::Config(e.to_string()))?;
        Ok(Self::assemble(config, strategy))
    }

    /// 组装各组件，调用方负责先校验配置
    fn assemble(config: &LoadBalancerConfig, strategy: Box<dyn BalancingStrategy>) -> Self {
        let registry = Arc::new(ProviderRegistry::new(config.capacity));
        let scheduler = HealthCheckScheduler::new(registry.clone());

        info!(
            "Created load balancer: capacity={}, per-provider call limit={:?}",
            config.capacity, config.simultaneous_call_single_provider_limit
        );

        Self {
            registry,
            gate: AdmissionGate::new(config.simultaneous_call_single_provider_limit),
            strategy: Mutex::new(strategy),
            scheduler,
        }
    }

    pub fn register(&self, provider: SharedProvider<R>) -> LoadBalancerResult<ProviderId> {
        self.registry.register(provider)
    }

    /// 移除该provider的所有注册项，返回移除的数量
    pub fn unregister(&self, provider: &SharedProvider<R>) -> usize {
        self.registry.unregister(provider)
    }

    pub fn unregister_id(&self, id: ProviderId) -> bool {
        self.registry.unregister_id(id)
    }

    /// 选择一个活跃provider并调用它
    ///
    /// 不会重试失败的调用，也不会因为调用失败而改变provider的健康状态，
    /// 健康状态只由探测结果决定
    pub async fn get(&self) -> LoadBalancerResult<R> {
        let active = self.registry.snapshot_active();
        if active.is_empty() {
            debug!("No active providers among {} registered", self.registry.len());
            return Err(LoadBalancerError::NoActiveProviders);
        }

        // permit在所有返回路径上drop，包括调用方放弃该future
        let _permit = self.gate.try_admit(active.len())?;

        let index = self.strategy.lock().select_index(active.len());
        let entry = active
            .get(index)
            .ok_or(LoadBalancerError::InvalidSelection {
                index,
                active: active.len(),
            })?;

        debug!(
            "Selected provider {} '{}' ({} of {} active)",
            entry.id(),
            entry.name(),
            index + 1,
            active.len()
        );

        let _call = entry.begin_call();
        entry
            .provider()
            .attempt()
            .await
            .map_err(|source| {
                debug!("Provider {} '{}' failed: {}", entry.id(), entry.name(), source);
                LoadBalancerError::UnderlyingProviderError {
                    provider: entry.id(),
                    source,
                }
            })
    }

    /// 立即执行一轮健康探测
    pub async fn check_providers_health(&self) -> SweepSummary {
        self.registry.probe_sweep().await
    }

    pub async fn start_health_checking(&self, period: Duration) -> LoadBalancerResult<()> {
        self.scheduler.start(period).await
    }

    pub async fn stop_health_checking(&self, timeout: Duration) -> LoadBalancerResult<()> {
        self.scheduler.stop(timeout).await
    }

    pub fn is_health_checking(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn health_report(&self) -> Vec<ProviderHealth> {
        self.registry.health_report()
    }

    /// 当前正在进行的调用总数
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    pub fn active_count(&self) -> usize {
        self.registry.snapshot_active().len()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }
}

impl<R: Send + 'static> Default for LoadBalancer<R> {
    /// 容量10、随机策略、不限制并发
    fn default() -> Self {
        let config = LoadBalancerConfig::default();
        Self::assemble(&config, strategy::from_kind(config.strategy))
    }
}
