// src/policy/timeout.rs
//! Default timeout policy: a single optional global duration

use crate::policy::TimeoutPolicy;
use crate::work_item::WorkItem;
use std::time::Duration;

/// Options for [`FixedTimeoutPolicy`]
#[derive(Debug, Clone, Default)]
pub struct TimeoutOptions {
    /// Applied to every dispatch; `None` disables enforcement
    pub global_timeout: Option<Duration>,
}

/// Returns the same configured timeout for every item
#[derive(Debug, Default)]
pub struct FixedTimeoutPolicy {
    options: TimeoutOptions,
}

impl FixedTimeoutPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            options: TimeoutOptions {
                global_timeout: Some(timeout),
            },
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl TimeoutPolicy for FixedTimeoutPolicy {
    fn timeout_for(&self, _item: &WorkItem) -> Option<Duration> {
        self.options.global_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;

    #[test]
    fn test_default_is_unbounded() {
        let item = WorkItem::new("a", "e", WorkItemKind::Job);
        assert!(FixedTimeoutPolicy::default().timeout_for(&item).is_none());
        assert!(FixedTimeoutPolicy::unbounded().timeout_for(&item).is_none());
    }

    #[test]
    fn test_fixed_duration() {
        let policy = FixedTimeoutPolicy::new(Duration::from_millis(100));
        let item = WorkItem::new("a", "e", WorkItemKind::Job);
        assert_eq!(policy.timeout_for(&item), Some(Duration::from_millis(100)));
    }
}
