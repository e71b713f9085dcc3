use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// provider的健康状态
///
/// 失败后的provider需要连续两次探测成功才会重新进入活跃列表，
/// 中间的 `Recovering` 阶段用于抑制状态抖动
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// 健康，可以接收请求（注册后的初始状态）
    Ok,
    /// 失败后第一次探测成功，尚未被信任
    Recovering,
    /// 最近一次探测失败
    Nok,
}

impl HealthStatus {
    /// 根据当前状态和最新一次探测结果计算下一个状态
    pub fn after_probe(self, healthy: bool) -> HealthStatus {
        match (self, healthy) {
            (_, false) => HealthStatus::Nok,
            (HealthStatus::Nok, true) => HealthStatus::Recovering,
            (HealthStatus::Recovering, true) | (HealthStatus::Ok, true) => HealthStatus::Ok,
        }
    }

    /// 只有 `Ok` 的provider会出现在活跃快照中
    pub fn is_active(self) -> bool {
        self == HealthStatus::Ok
    }

    fn as_u8(self) -> u8 {
        match self {
            HealthStatus::Ok => 0,
            HealthStatus::Recovering => 1,
            HealthStatus::Nok => 2,
        }
    }

    fn from_u8(value: u8) -> HealthStatus {
        match value {
            0 => HealthStatus::Ok,
            1 => HealthStatus::Recovering,
            _ => HealthStatus::Nok,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Recovering => write!(f, "RECOVERING"),
            HealthStatus::Nok => write!(f, "NOK"),
        }
    }
}

/// 可被后台探测任务写入、被请求线程无锁读取的状态单元
#[derive(Debug)]
pub struct AtomicHealthStatus(AtomicU8);

impl AtomicHealthStatus {
    pub fn new(status: HealthStatus) -> Self {
        Self(AtomicU8::new(status.as_u8()))
    }

    pub fn load(&self) -> HealthStatus {
        HealthStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// 应用一次探测结果，返回 (旧状态, 新状态)
    pub fn apply_probe(&self, healthy: bool) -> (HealthStatus, HealthStatus) {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let previous = HealthStatus::from_u8(current);
            let next = previous.after_probe(healthy);
            match self.0.compare_exchange_weak(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return (previous, next),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicHealthStatus {
    fn default() -> Self {
        Self::new(HealthStatus::Ok)
    }
}
