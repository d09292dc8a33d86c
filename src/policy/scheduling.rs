// src/policy/scheduling.rs
//! Scheduling strategies: which agent does a worker service next
//!
//! All strategies share one eligibility rule (agent idle, queue non-empty)
//! and differ only in how they rank eligible agents. The kernel calls
//! `select_next` while holding its scheduling-selection lock, so strategies
//! may keep internal cursor state without their own synchronization beyond
//! interior mutability.

use crate::policy::{AgentView, SchedulingContext, SchedulingPolicy};
use parking_lot::Mutex;
use rand::Rng;

/// Weights for [`TimeSliceAwareSchedulingPolicy`]
#[derive(Debug, Clone)]
pub struct SchedulingOptions {
    /// Penalty for recently busy agents (default: 0.7)
    pub utilization_weight: f64,

    /// Penalty for agents with long average execution times (default: 0.5)
    pub execution_time_weight: f64,

    /// Penalty per queued item, mild backlog tie-break (default: 0.1)
    pub queue_length_weight: f64,

    /// Random jitter to break oscillation patterns, typically 0.0-0.05
    /// (default: 0.0)
    pub random_jitter_weight: f64,
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self {
            utilization_weight: 0.7,
            execution_time_weight: 0.5,
            queue_length_weight: 0.1,
            random_jitter_weight: 0.0,
        }
    }
}

/// Cycles a cursor across the agent list, skipping running or empty agents.
/// Fair by rotation only.
pub struct RoundRobinSchedulingPolicy {
    cursor: Mutex<usize>,
}

impl RoundRobinSchedulingPolicy {
    pub fn new() -> Self {
        Self {
            cursor: Mutex::new(0),
        }
    }
}

impl Default for RoundRobinSchedulingPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPolicy for RoundRobinSchedulingPolicy {
    fn select_next(&self, agents: &[AgentView], _ctx: &SchedulingContext) -> Option<String> {
        if agents.is_empty() {
            return None;
        }

        let mut cursor = self.cursor.lock();
        for _ in 0..agents.len() {
            *cursor = (*cursor + 1) % agents.len();
            let agent = &agents[*cursor];
            if agent.is_eligible() {
                return Some(agent.id.clone());
            }
        }
        None
    }
}

/// Prefers less-utilized agents with a mild backlog tie-break:
/// score = 0.7 * utilization% + 0.1 * queue length, minimum wins.
#[derive(Debug, Clone, Copy)]
pub struct FairnessSchedulingPolicy;

impl SchedulingPolicy for FairnessSchedulingPolicy {
    fn select_next(&self, agents: &[AgentView], _ctx: &SchedulingContext) -> Option<String> {
        agents
            .iter()
            .filter(|a| a.is_eligible())
            .map(|a| (a, a.utilization_percent * 0.7 + a.queue_len as f64 * 0.1))
            .min_by(|(_, sa), (_, sb)| sa.total_cmp(sb))
            .map(|(a, _)| a.id.clone())
    }
}

/// Balances fairness against time-slice efficiency: agents with long
/// average execution times or high utilization are penalized so that
/// agents with individually short items are not starved.
pub struct TimeSliceAwareSchedulingPolicy {
    options: SchedulingOptions,
}

impl TimeSliceAwareSchedulingPolicy {
    pub fn new(options: SchedulingOptions) -> Self {
        Self { options }
    }
}

impl Default for TimeSliceAwareSchedulingPolicy {
    fn default() -> Self {
        Self::new(SchedulingOptions::default())
    }
}

impl SchedulingPolicy for TimeSliceAwareSchedulingPolicy {
    fn select_next(&self, agents: &[AgentView], _ctx: &SchedulingContext) -> Option<String> {
        let opts = &self.options;
        let mut rng = rand::thread_rng();

        agents
            .iter()
            .filter(|a| a.is_eligible())
            .map(|a| {
                let jitter = if opts.random_jitter_weight > 0.0 {
                    rng.gen::<f64>() * opts.random_jitter_weight
                } else {
                    0.0
                };
                let score = a.utilization_percent * opts.utilization_weight
                    + (a.avg_execution_ms / 100.0) * opts.execution_time_weight
                    + a.queue_len as f64 * opts.queue_length_weight
                    + jitter;
                (a, score)
            })
            .min_by(|(_, sa), (_, sb)| sa.total_cmp(sb))
            .map(|(a, _)| a.id.clone())
    }
}
