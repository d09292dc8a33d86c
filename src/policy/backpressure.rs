// src/policy/backpressure.rs
//! Default backpressure policy: cluster-wide queue thresholds

use crate::policy::{BackpressureDecision, BackpressurePolicy, ClusterLoad};

/// Thresholds for [`ThresholdBackpressurePolicy`]
#[derive(Debug, Clone)]
pub struct BackpressureOptions {
    /// Total queued items at which Throttle is reported (default: 10 000)
    pub throttle_threshold: usize,

    /// Total queued items at which new work is shed (default: 50 000)
    pub shed_threshold: usize,
}

impl Default for BackpressureOptions {
    fn default() -> Self {
        Self {
            throttle_threshold: 10_000,
            shed_threshold: 50_000,
        }
    }
}

/// Sheds above the shed threshold, throttles above the throttle threshold.
/// Only Shed has an enforced effect; Throttle is reported for observability
/// and reserved for future admission tightening.
#[derive(Debug, Default)]
pub struct ThresholdBackpressurePolicy {
    options: BackpressureOptions,
}

impl ThresholdBackpressurePolicy {
    pub fn new(options: BackpressureOptions) -> Self {
        Self { options }
    }
}

impl BackpressurePolicy for ThresholdBackpressurePolicy {
    fn evaluate(&self, load: ClusterLoad) -> BackpressureDecision {
        if load.total_queued >= self.options.shed_threshold {
            BackpressureDecision::Shed
        } else if load.total_queued >= self.options.throttle_threshold {
            BackpressureDecision::Throttle
        } else {
            BackpressureDecision::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(total_queued: usize) -> ClusterLoad {
        ClusterLoad {
            total_queued,
            total_running: 0,
        }
    }

    #[test]
    fn test_thresholds() {
        let policy = ThresholdBackpressurePolicy::default();
        assert_eq!(policy.evaluate(load(0)), BackpressureDecision::Normal);
        assert_eq!(policy.evaluate(load(9_999)), BackpressureDecision::Normal);
        assert_eq!(policy.evaluate(load(10_000)), BackpressureDecision::Throttle);
        assert_eq!(policy.evaluate(load(49_999)), BackpressureDecision::Throttle);
        assert_eq!(policy.evaluate(load(50_000)), BackpressureDecision::Shed);
    }

    #[test]
    fn test_zero_thresholds_shed_everything() {
        let policy = ThresholdBackpressurePolicy::new(BackpressureOptions {
            throttle_threshold: 0,
            shed_threshold: 0,
        });
        assert_eq!(policy.evaluate(load(0)), BackpressureDecision::Shed);
    }
}
