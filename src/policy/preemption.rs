// src/policy/preemption.rs
//! Preemption policies
//!
//! Preemption is opt-in and always cooperative: the kernel cancels the
//! running dispatch's context and boosts the incoming entry; the handler
//! decides when to actually stop.

use crate::policy::{PreemptionDecision, PreemptionPolicy, RunningInvocation};
use crate::work_item::WorkItem;

/// Default: never preempt
#[derive(Debug, Clone, Copy)]
pub struct NeverPreemptPolicy;

impl PreemptionPolicy for NeverPreemptPolicy {
    fn should_preempt(
        &self,
        _incoming: &WorkItem,
        _current: &RunningInvocation,
    ) -> PreemptionDecision {
        PreemptionDecision::No
    }
}

/// Preempts whenever the incoming item outranks the running one
#[derive(Debug, Clone, Copy)]
pub struct CooperativePreemptPolicy;

impl PreemptionPolicy for CooperativePreemptPolicy {
    fn should_preempt(
        &self,
        incoming: &WorkItem,
        current: &RunningInvocation,
    ) -> PreemptionDecision {
        if incoming.priority > current.item.priority {
            PreemptionDecision::Cooperative
        } else {
            PreemptionDecision::No
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;
    use std::sync::Arc;
    use std::time::Instant;

    fn running(priority: i32) -> RunningInvocation {
        RunningInvocation {
            item: Arc::new(
                WorkItem::new("a", "e", WorkItemKind::Job).with_priority(priority),
            ),
            started_at: Instant::now(),
        }
    }

    #[test]
    fn test_never_preempt() {
        let policy = NeverPreemptPolicy;
        let urgent = WorkItem::new("a", "e", WorkItemKind::Command).with_priority(100);
        assert_eq!(policy.should_preempt(&urgent, &running(0)), PreemptionDecision::No);
    }

    #[test]
    fn test_cooperative_on_higher_priority() {
        let policy = CooperativePreemptPolicy;
        let urgent = WorkItem::new("a", "e", WorkItemKind::Command).with_priority(10);
        let equal = WorkItem::new("a", "e", WorkItemKind::Command).with_priority(5);

        assert_eq!(
            policy.should_preempt(&urgent, &running(5)),
            PreemptionDecision::Cooperative
        );
        assert_eq!(policy.should_preempt(&equal, &running(5)), PreemptionDecision::No);
    }
}
