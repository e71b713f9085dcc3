use chrono::{DateTime, Utc};
use ferry_core::Provider;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::{LoadBalancerError, LoadBalancerResult};
use super::health::{AtomicHealthStatus, HealthStatus};

/// 可共享的provider句柄
pub type SharedProvider<R> = Arc<dyn Provider<Response = R>>;

/// 注册时分配的编号，同一个provider注册两次会得到两个编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProviderId(u64);

impl ProviderId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 注册表中的一项：provider本身、健康状态和正在进行的调用数
pub struct ProviderEntry<R> {
    id: ProviderId,
    provider: SharedProvider<R>,
    status: AtomicHealthStatus,
    in_flight: AtomicUsize,
    last_checked: Mutex<Option<DateTime<Utc>>>,
}

/// 正在进行的一次provider调用，drop时减少该provider的调用计数
pub(crate) struct CallGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<R: Send> ProviderEntry<R> {
    fn new(id: ProviderId, provider: SharedProvider<R>) -> Self {
        Self {
            id,
            provider,
            status: AtomicHealthStatus::new(HealthStatus::Ok),
            in_flight: AtomicUsize::new(0),
            last_checked: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn provider(&self) -> &SharedProvider<R> {
        &self.provider
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn status(&self) -> HealthStatus {
        self.status.load()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self.last_checked.lock()
    }

    /// 是否与给定的provider是同一个实例
    pub fn is_same_provider(&self, provider: &SharedProvider<R>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.provider), Arc::as_ptr(provider))
    }

    pub(crate) fn begin_call(&self) -> CallGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        CallGuard {
            in_flight: &self.in_flight,
        }
    }

    /// 调用provider的健康探测并更新状态，返回 (旧状态, 新状态)
    async fn probe(&self) -> (HealthStatus, HealthStatus) {
        let healthy = self.provider.probe().await;
        *self.last_checked.lock() = Some(Utc::now());
        self.status.apply_probe(healthy)
    }

    pub fn health(&self) -> ProviderHealth {
        ProviderHealth {
            id: self.id,
            name: self.name().to_string(),
            status: self.status(),
            in_flight: self.in_flight(),
            last_checked: self.last_checked(),
        }
    }
}

impl<R: Send> fmt::Debug for ProviderEntry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("status", &self.status())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// 单个provider的健康报告
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub id: ProviderId,
    pub name: String,
    pub status: HealthStatus,
    pub in_flight: usize,
    pub last_checked: Option<DateTime<Utc>>,
}

/// 一轮健康探测的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub checked: usize,
    pub active: usize,
    pub recovering: usize,
    pub unhealthy: usize,
}

/// provider注册表
///
/// 持有所有已注册的provider及其健康状态。列表由读写锁保护，
/// 但任何provider代码（`attempt`/`probe`）都不会在持锁期间执行，
/// 慢的provider不会阻塞注册、移除或请求路由
pub struct ProviderRegistry<R> {
    capacity: usize,
    entries: RwLock<Vec<Arc<ProviderEntry<R>>>>,
    next_id: AtomicU64,
    sweep_lock: tokio::sync::Mutex<()>,
}

impl<R: Send> ProviderRegistry<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sweep_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 注册provider，初始状态为 `Ok`
    ///
    /// 不做去重，同一个provider可以注册多次
    pub fn register(&self, provider: SharedProvider<R>) -> LoadBalancerResult<ProviderId> {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity {
            warn!(
                "Rejecting registration of '{}': registry is full ({} providers)",
                provider.name(),
                self.capacity
            );
            return Err(LoadBalancerError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let id = ProviderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!("Registered provider {} '{}'", id, provider.name());
        entries.push(Arc::new(ProviderEntry::new(id, provider)));
        Ok(id)
    }

    /// 移除所有与给定provider是同一实例的项，返回移除的数量
    ///
    /// 找不到时不是错误。已经开始的调用仍会在被移除的provider上完成
    pub fn unregister(&self, provider: &SharedProvider<R>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| !entry.is_same_provider(provider));
        let removed = before - entries.len();

        if removed > 0 {
            info!("Unregistered {} entries of provider '{}'", removed, provider.name());
        } else {
            debug!("Provider '{}' was not registered, nothing to remove", provider.name());
        }
        removed
    }

    /// 按注册编号移除
    pub fn unregister_id(&self, id: ProviderId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;

        if removed {
            info!("Unregistered provider {}", id);
        }
        removed
    }

    /// 当前活跃（`Ok`）provider的快照，按注册顺序排列
    ///
    /// 快照归调用方所有，之后的注册或移除不会影响它
    pub fn snapshot_active(&self) -> Vec<Arc<ProviderEntry<R>>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.status().is_active())
            .cloned()
            .collect()
    }

    /// 所有provider的快照，不论健康状态
    pub fn snapshot_all(&self) -> Vec<Arc<ProviderEntry<R>>> {
        self.entries.read().clone()
    }

    pub fn health_report(&self) -> Vec<ProviderHealth> {
        self.snapshot_all().iter().map(|entry| entry.health()).collect()
    }

    /// 对所有provider执行一轮健康探测
    ///
    /// 先在读锁下复制列表，探测时不持有注册表的锁。多轮探测之间互斥，
    /// 手动触发的探测不会与后台探测重叠。某个provider的 `probe` 卡住时，
    /// 整轮探测也会卡住
    pub async fn probe_sweep(&self) -> SweepSummary {
        let _sweep = self.sweep_lock.lock().await;
        let entries = self.snapshot_all();
        debug!("Starting health probe sweep for {} providers", entries.len());

        let mut summary = SweepSummary::default();
        for entry in entries {
            let (previous, current) = entry.probe().await;
            summary.checked += 1;

            match current {
                HealthStatus::Ok => summary.active += 1,
                HealthStatus::Recovering => summary.recovering += 1,
                HealthStatus::Nok => summary.unhealthy += 1,
            }

            if previous == current {
                continue;
            }
            match current {
                HealthStatus::Nok => warn!(
                    "Provider {} '{}' failed health probe: {} -> {}",
                    entry.id,
                    entry.name(),
                    previous,
                    current
                ),
                HealthStatus::Recovering => info!(
                    "Provider {} '{}' passed health probe, recovering",
                    entry.id,
                    entry.name()
                ),
                HealthStatus::Ok => info!(
                    "Provider {} '{}' recovered and is active again",
                    entry.id,
                    entry.name()
                ),
            }
        }

        debug!(
            "Completed health probe sweep: checked={}, active={}, recovering={}, unhealthy={}",
            summary.checked, summary.active, summary.recovering, summary.unhealthy
        );
        summary
    }
}
