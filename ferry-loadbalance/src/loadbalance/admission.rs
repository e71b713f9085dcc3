use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::error::{LoadBalancerError, LoadBalancerResult};

/// 集群级背压控制
///
/// 统计所有正在进行的调用，超过 `limit × 活跃provider数` 时立即拒绝新调用，
/// 被拒绝的调用不会排队
#[derive(Debug)]
pub struct AdmissionGate {
    in_flight: AtomicUsize,
    limit: Option<NonZeroUsize>,
}

/// 一个已被放行的调用占用的名额，drop时归还
///
/// 无论调用成功、provider返回错误还是调用方放弃了future，名额都只归还一次
#[derive(Debug)]
#[must_use = "dropping the permit releases the admission slot immediately"]
pub struct AdmissionPermit<'a> {
    gate: &'a AdmissionGate,
}

impl AdmissionGate {
    pub fn new(limit: Option<NonZeroUsize>) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// 尝试放行一个调用
    ///
    /// 先乐观地增加计数，再用增加后的值与上限比较；拒绝时把计数减回去
    pub fn try_admit(&self, active_count: usize) -> LoadBalancerResult<AdmissionPermit<'_>> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;

        if let Some(limit) = self.limit {
            let cluster_limit = limit.get().saturating_mul(active_count);
            if in_flight > cluster_limit {
                self.release();
                tracing::warn!(
                    "Rejecting call: {} calls in flight exceeds cluster limit {} ({} x {} active providers)",
                    in_flight,
                    cluster_limit,
                    limit,
                    active_count
                );
                return Err(LoadBalancerError::ClusterCapacityExceeded {
                    in_flight,
                    limit: cluster_limit,
                });
            }
        }

        Ok(AdmissionPermit { gate: self })
    }

    /// 当前正在进行的调用数
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<NonZeroUsize> {
        self.limit
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_always_admits() {
        let gate = AdmissionGate::unlimited();
        let permits: Vec<_> = (0..100).map(|_| gate.try_admit(1).unwrap()).collect();
        assert_eq!(gate.in_flight(), 100);

        drop(permits);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn test_rejects_beyond_limit_times_active() {
        let gate = AdmissionGate::new(NonZeroUsize::new(2));

        // 2 x 3 = 6 个名额
        let permits: Vec<_> = (0..6).map(|_| gate.try_admit(3).unwrap()).collect();
        assert_eq!(gate.in_flight(), 6);

        let err = gate.try_admit(3).unwrap_err();
        assert!(matches!(
            err,
            LoadBalancerError::ClusterCapacityExceeded {
                in_flight: 7,
                limit: 6
            }
        ));
        // 被拒绝的调用不占用名额
        assert_eq!(gate.in_flight(), 6);

        drop(permits);
        assert_eq!(gate.in_flight(), 0);
    }

    #[test]
    fn test_released_slot_admits_next_call() {
        let gate = AdmissionGate::new(NonZeroUsize::new(1));

        let first = gate.try_admit(1).unwrap();
        assert!(gate.try_admit(1).is_err());

        drop(first);
        let second = gate.try_admit(1);
        assert!(second.is_ok());
    }

    #[test]
    fn test_limit_scales_with_active_count() {
        let gate = AdmissionGate::new(NonZeroUsize::new(1));

        let _a = gate.try_admit(2).unwrap();
        let _b = gate.try_admit(2).unwrap();
        // 活跃provider减少后，上限随之降低
        assert!(gate.try_admit(1).is_err());
        assert_eq!(gate.in_flight(), 2);
    }

    #[test]
    fn test_extreme_limit_does_not_overflow() {
        let gate = AdmissionGate::new(NonZeroUsize::new(usize::MAX));
        let _permit = gate.try_admit(4).unwrap();
        assert_eq!(gate.limit(), NonZeroUsize::new(usize::MAX));
    }
}
