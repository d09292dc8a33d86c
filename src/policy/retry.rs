// src/policy/retry.rs
//! Default retry policy: capped exponential backoff with optional jitter

use crate::error::KernelError;
use crate::policy::{RetryDecision, RetryPolicy};
use crate::work_item::WorkItem;
use rand::Rng;
use std::time::Duration;

/// Options for [`BackoffRetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Attempts after which the item is dropped (default: 3)
    pub max_attempts: u32,

    /// First-retry delay, doubled per attempt (default: 250ms)
    pub base_delay: Duration,

    /// Upper bound on the computed delay (default: 10s)
    pub max_delay: Duration,

    /// Multiply the delay by a uniform factor in [0.875, 1.125]
    pub use_jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            use_jitter: true,
        }
    }
}

/// Retries non-cancellation failures up to `max_attempts`, with delay
/// `min(max_delay, base_delay * 2^(attempt-1))`.
#[derive(Debug, Default)]
pub struct BackoffRetryPolicy {
    options: RetryOptions,
}

impl BackoffRetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }
}

impl RetryPolicy for BackoffRetryPolicy {
    fn on_failure(&self, _item: &WorkItem, error: &KernelError, attempt: u32) -> RetryDecision {
        // Timeouts, preemption, and shutdown surface as canceled, never retried
        if error.is_cancellation() {
            return RetryDecision::give_up("Canceled");
        }
        if attempt >= self.options.max_attempts {
            return RetryDecision::give_up("MaxAttemptsReached");
        }

        let base_ms = self.options.base_delay.as_millis().max(1) as f64;
        let cap_ms = self.options.max_delay.as_millis().max(1) as f64;
        let pow = 2f64.powi(attempt.saturating_sub(1) as i32);
        let mut delay_ms = (base_ms * pow).min(cap_ms);

        if self.options.use_jitter {
            let factor = rand::thread_rng().gen_range(0.875..=1.125);
            delay_ms *= factor;
        }

        RetryDecision::retry(Duration::from_millis(delay_ms as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;

    fn item() -> WorkItem {
        WorkItem::new("a", "e", WorkItemKind::Job)
    }

    fn failure() -> KernelError {
        KernelError::Handler("boom".into())
    }

    fn no_jitter() -> BackoffRetryPolicy {
        BackoffRetryPolicy::new(RetryOptions {
            use_jitter: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_never_retries_cancellation() {
        let policy = BackoffRetryPolicy::default();
        let decision = policy.on_failure(&item(), &KernelError::Canceled, 1);
        assert!(!decision.should_retry);
        assert_eq!(decision.reason.as_deref(), Some("Canceled"));
    }

    #[test]
    fn test_stops_at_max_attempts() {
        let policy = BackoffRetryPolicy::default();
        let decision = policy.on_failure(&item(), &failure(), 3);
        assert!(!decision.should_retry);
        assert_eq!(decision.reason.as_deref(), Some("MaxAttemptsReached"));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = no_jitter();
        let d1 = policy.on_failure(&item(), &failure(), 1);
        let d2 = policy.on_failure(&item(), &failure(), 2);
        assert!(d1.should_retry);
        assert_eq!(d1.delay, Some(Duration::from_millis(250)));
        assert_eq!(d2.delay, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = BackoffRetryPolicy::new(RetryOptions {
            max_attempts: 20,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(1),
            use_jitter: false,
        });
        let decision = policy.on_failure(&item(), &failure(), 10);
        assert_eq!(decision.delay, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = BackoffRetryPolicy::default();
        for _ in 0..50 {
            let decision = policy.on_failure(&item(), &failure(), 1);
            let ms = decision.delay.unwrap().as_millis() as f64;
            assert!((218.0..=282.0).contains(&ms), "delay out of band: {ms}");
        }
    }
}
