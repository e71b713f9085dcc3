use ferry_core::StrategyKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 负载均衡算法
///
/// 返回下一个被选中的活跃provider在快照中的下标（从0开始）。
/// 策略可以在多次调用之间保存状态，调用方负责串行化调用，
/// 不会有两个线程同时调用同一个策略。
pub trait BalancingStrategy: Send {
    /// `active_count` 由调用方保证大于0，传入0时的行为未定义（实现可以直接panic）
    fn select_index(&mut self, active_count: usize) -> usize;
}

/// 均匀随机选择
///
/// 随机源可以注入，测试时使用固定种子即可得到确定的序列
pub struct RandomStrategy<R = StdRng> {
    rng: R,
}

impl RandomStrategy<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomStrategy<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl Default for RandomStrategy<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> BalancingStrategy for RandomStrategy<R> {
    fn select_index(&mut self, active_count: usize) -> usize {
        self.rng.random_range(0..active_count)
    }
}

/// 简化的轮询，不跟踪活跃provider列表的变化
///
/// 游标只相对于调用时的活跃数量取模，活跃集合变大或变小时，
/// 下一个被命中的provider会随之偏移
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    next_position: usize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next_position: usize) -> Self {
        Self { next_position }
    }
}

impl BalancingStrategy for RoundRobinStrategy {
    fn select_index(&mut self, active_count: usize) -> usize {
        let selected = self.next_position % active_count;
        self.next_position = (selected + 1) % active_count;
        selected
    }
}

/// 根据配置构建策略
pub fn from_kind(kind: StrategyKind) -> Box<dyn BalancingStrategy> {
    match kind {
        StrategyKind::Random => Box::new(RandomStrategy::new()),
        StrategyKind::RoundRobin => Box::new(RoundRobinStrategy::new()),
    }
}
