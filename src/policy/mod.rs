// src/policy/mod.rs
//! Pluggable kernel policies
//!
//! Seven independent decision strategies govern the kernel:
//!
//! - **Admission**: per-agent accept/defer/reject at enqueue time
//! - **Ordering**: which queued item runs next for one agent
//! - **Retry**: whether and when a failed item is re-enqueued
//! - **Timeout**: optional per-dispatch execution deadline
//! - **Preemption**: cooperative cancellation of a running dispatch
//! - **Backpressure**: cluster-wide normal/throttle/shed gate
//! - **Scheduling**: which agent a worker services next
//!
//! Policies are flat trait objects, not a hierarchy. A [`PolicySet`] binds
//! any subset; unset concerns fall back to process-wide defaults, which in
//! turn fall back to the built-in strategies.

pub mod admission;
pub mod backpressure;
pub mod ordering;
pub mod preemption;
pub mod retry;
pub mod scheduling;
pub mod timeout;

use crate::error::KernelError;
use crate::work_item::WorkItem;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use admission::{AdmissionOptions, ThresholdAdmissionPolicy};
pub use backpressure::{BackpressureOptions, ThresholdBackpressurePolicy};
pub use ordering::PriorityOrderingPolicy;
pub use preemption::{CooperativePreemptPolicy, NeverPreemptPolicy};
pub use retry::{BackoffRetryPolicy, RetryOptions};
pub use scheduling::{
    FairnessSchedulingPolicy, RoundRobinSchedulingPolicy, SchedulingOptions,
    TimeSliceAwareSchedulingPolicy,
};
pub use timeout::{FixedTimeoutPolicy, TimeoutOptions};

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Accept,
    /// Accept with a short enqueue delay; not re-evaluated later
    Defer,
    /// Drop the item and count it against the mailbox
    Reject,
}

/// Outcome of a preemption check. There is no forced variant: preemption is
/// a cancellation signal the running handler must observe voluntarily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreemptionDecision {
    No,
    Cooperative,
}

/// Outcome of a cluster-wide backpressure check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressureDecision {
    Normal,
    /// Evaluated and logged, but reserved: no distinct enforcement yet
    Throttle,
    /// Drop before admission; the item never reaches a mailbox
    Shed,
}

/// Outcome of a retry check after a handler failure
#[derive(Debug, Clone)]
pub struct RetryDecision {
    pub should_retry: bool,
    pub delay: Option<Duration>,
    pub reason: Option<String>,
}

impl RetryDecision {
    pub fn retry(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay: Some(delay),
            reason: None,
        }
    }

    pub fn give_up(reason: impl Into<String>) -> Self {
        Self {
            should_retry: false,
            delay: None,
            reason: Some(reason.into()),
        }
    }
}

/// Per-agent state visible to admission checks
#[derive(Debug, Clone, Copy)]
pub struct AgentState {
    pub is_running: bool,
    pub queue_len: usize,
}

/// Description of the dispatch currently running on an agent
#[derive(Debug, Clone)]
pub struct RunningInvocation {
    pub item: Arc<WorkItem>,
    pub started_at: Instant,
}

/// Cluster-wide load, computed fresh on every enqueue
#[derive(Debug, Clone, Copy)]
pub struct ClusterLoad {
    pub total_queued: usize,
    pub total_running: usize,
}

/// Read-only view of one agent used by scheduling strategies
#[derive(Debug, Clone)]
pub struct AgentView {
    pub id: String,
    pub queue_len: usize,
    pub is_running: bool,
    pub utilization_percent: f64,
    pub avg_execution_ms: f64,
}

impl AgentView {
    /// Eligibility is identical for every scheduling strategy: the agent is
    /// idle and has queued work.
    pub fn is_eligible(&self) -> bool {
        !self.is_running && self.queue_len > 0
    }
}

/// Cluster context for a scheduling decision
#[derive(Debug, Clone, Copy)]
pub struct SchedulingContext {
    pub total_running: usize,
    pub total_queued: usize,
    pub now: Instant,
}

/// Per-agent gate deciding accept/defer/reject at enqueue time
pub trait AdmissionPolicy: Send + Sync {
    fn admit(&self, item: &WorkItem, state: &AgentState) -> AdmissionDecision;
}

/// Total-order comparator over work items of one agent.
/// Must be transitive and consistent; `Ordering::Less` runs first.
pub trait OrderingPolicy: Send + Sync {
    fn compare(&self, a: &WorkItem, b: &WorkItem) -> Ordering;
}

/// Decides whether a failed item is re-enqueued, and after what delay.
/// `attempt` is the 1-based attempt number that just failed.
pub trait RetryPolicy: Send + Sync {
    fn on_failure(&self, item: &WorkItem, error: &KernelError, attempt: u32) -> RetryDecision;
}

/// Optional execution deadline per dispatch; `None` means unbounded
pub trait TimeoutPolicy: Send + Sync {
    fn timeout_for(&self, item: &WorkItem) -> Option<Duration>;
}

/// Decides whether an incoming item cancels the running dispatch
pub trait PreemptionPolicy: Send + Sync {
    fn should_preempt(&self, incoming: &WorkItem, current: &RunningInvocation)
        -> PreemptionDecision;
}

/// Cluster-wide gate evaluated before admission
pub trait BackpressurePolicy: Send + Sync {
    fn evaluate(&self, load: ClusterLoad) -> BackpressureDecision;
}

/// Picks the next agent a worker should service, or `None` when no agent is
/// eligible. Strategies may keep internal state (e.g. a round-robin cursor);
/// the kernel only calls this while holding its selection lock.
pub trait SchedulingPolicy: Send + Sync {
    fn select_next(&self, agents: &[AgentView], ctx: &SchedulingContext) -> Option<String>;
}

/// A binding of strategies, any subset of which may be set.
/// Unset slots fall back during [`PolicySet::resolve_with`].
#[derive(Default, Clone)]
pub struct PolicySet {
    pub admission: Option<Arc<dyn AdmissionPolicy>>,
    pub ordering: Option<Arc<dyn OrderingPolicy>>,
    pub retry: Option<Arc<dyn RetryPolicy>>,
    pub timeout: Option<Arc<dyn TimeoutPolicy>>,
    pub preemption: Option<Arc<dyn PreemptionPolicy>>,
    pub backpressure: Option<Arc<dyn BackpressurePolicy>>,
    pub scheduling: Option<Arc<dyn SchedulingPolicy>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admission(mut self, policy: Arc<dyn AdmissionPolicy>) -> Self {
        self.admission = Some(policy);
        self
    }

    pub fn with_ordering(mut self, policy: Arc<dyn OrderingPolicy>) -> Self {
        self.ordering = Some(policy);
        self
    }

    pub fn with_retry(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_timeout(mut self, policy: Arc<dyn TimeoutPolicy>) -> Self {
        self.timeout = Some(policy);
        self
    }

    pub fn with_preemption(mut self, policy: Arc<dyn PreemptionPolicy>) -> Self {
        self.preemption = Some(policy);
        self
    }

    pub fn with_backpressure(mut self, policy: Arc<dyn BackpressurePolicy>) -> Self {
        self.backpressure = Some(policy);
        self
    }

    pub fn with_scheduling(mut self, policy: Arc<dyn SchedulingPolicy>) -> Self {
        self.scheduling = Some(policy);
        self
    }

    /// Overlay this set on a fully resolved base: set slots win, unset slots
    /// inherit from the base.
    pub fn resolve_with(&self, base: &EffectivePolicies) -> EffectivePolicies {
        EffectivePolicies {
            admission: self.admission.clone().unwrap_or_else(|| base.admission.clone()),
            ordering: self.ordering.clone().unwrap_or_else(|| base.ordering.clone()),
            retry: self.retry.clone().unwrap_or_else(|| base.retry.clone()),
            timeout: self.timeout.clone().unwrap_or_else(|| base.timeout.clone()),
            preemption: self.preemption.clone().unwrap_or_else(|| base.preemption.clone()),
            backpressure: self
                .backpressure
                .clone()
                .unwrap_or_else(|| base.backpressure.clone()),
            scheduling: self.scheduling.clone().unwrap_or_else(|| base.scheduling.clone()),
        }
    }
}

/// A fully resolved policy set: every concern has a concrete strategy
#[derive(Clone)]
pub struct EffectivePolicies {
    pub admission: Arc<dyn AdmissionPolicy>,
    pub ordering: Arc<dyn OrderingPolicy>,
    pub retry: Arc<dyn RetryPolicy>,
    pub timeout: Arc<dyn TimeoutPolicy>,
    pub preemption: Arc<dyn PreemptionPolicy>,
    pub backpressure: Arc<dyn BackpressurePolicy>,
    pub scheduling: Arc<dyn SchedulingPolicy>,
}

impl EffectivePolicies {
    /// The built-in default strategies: threshold admission, priority
    /// ordering, exponential backoff retry, no timeout, no preemption,
    /// threshold backpressure, round-robin scheduling.
    pub fn builtin() -> Self {
        Self {
            admission: Arc::new(ThresholdAdmissionPolicy::default()),
            ordering: Arc::new(PriorityOrderingPolicy),
            retry: Arc::new(BackoffRetryPolicy::default()),
            timeout: Arc::new(FixedTimeoutPolicy::default()),
            preemption: Arc::new(NeverPreemptPolicy),
            backpressure: Arc::new(ThresholdBackpressurePolicy::default()),
            scheduling: Arc::new(RoundRobinSchedulingPolicy::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;

    #[test]
    fn test_eligibility() {
        let view = AgentView {
            id: "a".into(),
            queue_len: 1,
            is_running: false,
            utilization_percent: 0.0,
            avg_execution_ms: 0.0,
        };
        assert!(view.is_eligible());

        let running = AgentView {
            is_running: true,
            ..view.clone()
        };
        assert!(!running.is_eligible());

        let empty = AgentView {
            queue_len: 0,
            ..view
        };
        assert!(!empty.is_eligible());
    }

    #[test]
    fn test_resolve_overlay() {
        let base = EffectivePolicies::builtin();

        let strict = Arc::new(ThresholdAdmissionPolicy::new(AdmissionOptions {
            queue_soft_limit: 1,
            queue_hard_limit: 2,
            respect_deadline: true,
        }));
        let overlay = PolicySet::new().with_admission(strict);
        let resolved = overlay.resolve_with(&base);

        let item = WorkItem::new("a", "e", WorkItemKind::Job);
        let full = AgentState {
            is_running: false,
            queue_len: 2,
        };
        // overlay slot takes effect, inherited slots stay functional
        assert_eq!(resolved.admission.admit(&item, &full), AdmissionDecision::Reject);
        assert!(resolved.timeout.timeout_for(&item).is_none());
    }
}
