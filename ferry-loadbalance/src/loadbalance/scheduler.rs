use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{LoadBalancerError, LoadBalancerResult};
use super::registry::ProviderRegistry;

/// 后台健康检查调度器
///
/// 同一时间只有一个后台任务在运行，启动时立即执行一轮探测，
/// 之后按固定周期执行。两轮探测之间不会重叠
pub struct HealthCheckScheduler<R> {
    registry: Arc<ProviderRegistry<R>>,
    worker: Mutex<WorkerState>,
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum WorkerState {
    Idle,
    Running(RunningTask),
    /// 已取消，正在等待最后一轮探测结束
    Stopping,
}

/// `stop` 结束（包括其future被丢弃）时把状态恢复为 `Idle`
struct StoppingGuard<'a> {
    worker: &'a Mutex<WorkerState>,
}

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        *self.worker.lock() = WorkerState::Idle;
    }
}

impl<R: Send + 'static> HealthCheckScheduler<R> {
    pub fn new(registry: Arc<ProviderRegistry<R>>) -> Self {
        Self {
            registry,
            worker: Mutex::new(WorkerState::Idle),
        }
    }

    /// 启动后台健康检查
    ///
    /// 上一个任务仍在运行或仍在停止过程中时返回 `AlreadyRunning`
    pub async fn start(&self, period: Duration) -> LoadBalancerResult<()> {
        if period.is_zero() {
            return Err(LoadBalancerError::InvalidHealthCheckPeriod);
        }

        let mut worker = self.worker.lock();
        match &*worker {
            WorkerState::Stopping => return Err(LoadBalancerError::AlreadyRunning),
            WorkerState::Running(task) if !task.handle.is_finished() => {
                return Err(LoadBalancerError::AlreadyRunning);
            }
            WorkerState::Running(_) => {
                warn!("Previous health check task exited unexpectedly, restarting");
            }
            WorkerState::Idle => {}
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweeps(self.registry.clone(), period, cancel.clone()));
        *worker = WorkerState::Running(RunningTask { cancel, handle });

        info!("Started health checking with period: {:?}", period);
        Ok(())
    }

    /// 停止后台健康检查
    ///
    /// 正在进行的一轮探测会先执行完；超过 `timeout` 仍未结束时强制中止任务。
    /// 任务因panic退出时返回 `HealthCheckTaskFailed`。
    /// 无论哪种情况，返回后都可以再次启动
    pub async fn stop(&self, timeout: Duration) -> LoadBalancerResult<()> {
        let task = {
            let mut worker = self.worker.lock();
            match std::mem::replace(&mut *worker, WorkerState::Stopping) {
                WorkerState::Running(task) => task,
                previous => {
                    *worker = previous;
                    debug!("Health checking is not running, nothing to stop");
                    return Ok(());
                }
            }
        };
        let _stopping = StoppingGuard {
            worker: &self.worker,
        };
        let RunningTask { cancel, mut handle } = task;

        cancel.cancel();
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {
                info!("Stopped health checking");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Health check task failed: {}", e);
                Err(LoadBalancerError::HealthCheckTaskFailed(e))
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "Health check sweep did not finish within {:?}, task aborted",
                    timeout
                );
                Err(LoadBalancerError::HealthCheckStopTimedOut { timeout })
            }
        }
    }

    /// 后台任务是否存活，停止过程中仍视为运行
    pub fn is_running(&self) -> bool {
        match &*self.worker.lock() {
            WorkerState::Idle => false,
            WorkerState::Running(task) => !task.handle.is_finished(),
            WorkerState::Stopping => true,
        }
    }
}

impl<R> Drop for HealthCheckScheduler<R> {
    fn drop(&mut self) {
        if let WorkerState::Running(task) = self.worker.get_mut() {
            task.cancel.cancel();
        }
    }
}

async fn run_sweeps<R: Send>(
    registry: Arc<ProviderRegistry<R>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    // 探测耗时超过周期时顺延，而不是连续补跑
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                registry.probe_sweep().await;
            }
        }
    }

    debug!("Health check task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferry_core::{Provider, ProviderError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        probes: AtomicUsize,
        probe_delay: Option<Duration>,
        probing: AtomicBool,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        type Response = ();

        async fn attempt(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn probe(&self) -> bool {
            self.probing.store(true, Ordering::SeqCst);
            if let Some(delay) = self.probe_delay {
                tokio::time::sleep(delay).await;
            }
            self.probes.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl Provider for PanickingProvider {
        type Response = ();

        async fn attempt(&self) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn probe(&self) -> bool {
            panic!("probe exploded")
        }
    }

    fn scheduler_with(provider: Arc<CountingProvider>) -> HealthCheckScheduler<()> {
        let registry = Arc::new(ProviderRegistry::<()>::new(10));
        registry.register(provider).unwrap();
        HealthCheckScheduler::new(registry)
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_sweeps_immediately_and_periodically() {
        let provider = Arc::new(CountingProvider::default());
        let scheduler = scheduler_with(provider.clone());

        scheduler.start(Duration::from_millis(20)).await.unwrap();
        assert!(scheduler.is_running());

        wait_until(|| provider.probes.load(Ordering::SeqCst) >= 1).await;
        wait_until(|| provider.probes.load(Ordering::SeqCst) >= 3).await;

        scheduler.stop(Duration::from_secs(1)).await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let scheduler = scheduler_with(Arc::new(CountingProvider::default()));

        scheduler.start(Duration::from_millis(50)).await.unwrap();
        let err = scheduler.start(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, LoadBalancerError::AlreadyRunning));

        scheduler.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let provider = Arc::new(CountingProvider::default());
        let scheduler = scheduler_with(provider.clone());

        scheduler.start(Duration::from_millis(50)).await.unwrap();
        scheduler.stop(Duration::from_secs(1)).await.unwrap();

        let before = provider.probes.load(Ordering::SeqCst);
        scheduler.start(Duration::from_millis(50)).await.unwrap();
        wait_until(|| provider.probes.load(Ordering::SeqCst) > before).await;
        scheduler.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let scheduler = scheduler_with(Arc::new(CountingProvider::default()));
        let err = scheduler.start(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LoadBalancerError::InvalidHealthCheckPeriod));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let scheduler = scheduler_with(Arc::new(CountingProvider::default()));
        assert!(scheduler.stop(Duration::from_millis(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_sweep() {
        let provider = Arc::new(CountingProvider {
            probe_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let scheduler = scheduler_with(provider.clone());

        scheduler.start(Duration::from_secs(60)).await.unwrap();
        wait_until(|| provider.probing.load(Ordering::SeqCst)).await;

        scheduler.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_timeout_aborts_and_allows_restart() {
        let provider = Arc::new(CountingProvider {
            probe_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let scheduler = scheduler_with(provider.clone());

        scheduler.start(Duration::from_secs(60)).await.unwrap();
        wait_until(|| provider.probing.load(Ordering::SeqCst)).await;

        let err = scheduler.stop(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(
            err,
            LoadBalancerError::HealthCheckStopTimedOut { .. }
        ));
        assert!(!scheduler.is_running());

        scheduler.start(Duration::from_secs(60)).await.unwrap();
        assert!(scheduler.is_running());
        scheduler.stop(Duration::from_millis(20)).await.ok();
    }

    #[tokio::test]
    async fn test_start_during_stop_is_rejected() {
        let provider = Arc::new(CountingProvider {
            probe_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let scheduler = scheduler_with(provider.clone());

        scheduler.start(Duration::from_secs(60)).await.unwrap();
        wait_until(|| provider.probing.load(Ordering::SeqCst)).await;

        let (stopped, restarted) = tokio::join!(scheduler.stop(Duration::from_secs(2)), async {
            tokio::task::yield_now().await;
            assert!(scheduler.is_running());
            scheduler.start(Duration::from_secs(60)).await
        });
        stopped.unwrap();
        assert!(matches!(restarted, Err(LoadBalancerError::AlreadyRunning)));
        assert!(!scheduler.is_running());
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);

        // 旧任务结束后可以正常启动
        scheduler.start(Duration::from_secs(60)).await.unwrap();
        scheduler.stop(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_reports_panicked_task() {
        let registry = Arc::new(ProviderRegistry::<()>::new(10));
        registry.register(Arc::new(PanickingProvider)).unwrap();
        let scheduler = HealthCheckScheduler::new(registry);

        scheduler.start(Duration::from_secs(60)).await.unwrap();
        wait_until(|| !scheduler.is_running()).await;

        let err = scheduler.stop(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LoadBalancerError::HealthCheckTaskFailed(_)));
        assert!(!scheduler.is_running());
    }
}
