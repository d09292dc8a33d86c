// src/policy/admission.rs
//! Default admission policy: queue-length thresholds plus deadline check

use crate::policy::{AdmissionDecision, AdmissionPolicy, AgentState};
use crate::work_item::WorkItem;
use chrono::Utc;

/// Thresholds for [`ThresholdAdmissionPolicy`]
#[derive(Debug, Clone)]
pub struct AdmissionOptions {
    /// Queue length at which items are deferred (default: 32)
    pub queue_soft_limit: usize,

    /// Queue length at which items are rejected outright (default: 256)
    pub queue_hard_limit: usize,

    /// Reject items whose deadline has already elapsed (default: true)
    pub respect_deadline: bool,
}

impl Default for AdmissionOptions {
    fn default() -> Self {
        Self {
            queue_soft_limit: 32,
            queue_hard_limit: 256,
            respect_deadline: true,
        }
    }
}

/// Rejects above the hard limit or past-deadline, defers above the soft
/// limit, accepts otherwise.
#[derive(Debug, Default)]
pub struct ThresholdAdmissionPolicy {
    options: AdmissionOptions,
}

impl ThresholdAdmissionPolicy {
    pub fn new(options: AdmissionOptions) -> Self {
        Self { options }
    }
}

impl AdmissionPolicy for ThresholdAdmissionPolicy {
    fn admit(&self, item: &WorkItem, state: &AgentState) -> AdmissionDecision {
        if state.queue_len >= self.options.queue_hard_limit {
            return AdmissionDecision::Reject;
        }
        if self.options.respect_deadline {
            if let Some(deadline) = item.deadline {
                if deadline < Utc::now() {
                    return AdmissionDecision::Reject;
                }
            }
        }
        if state.queue_len >= self.options.queue_soft_limit {
            return AdmissionDecision::Defer;
        }
        AdmissionDecision::Accept
    }
}
