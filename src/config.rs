// src/config.rs
//! Kernel configuration
//!
//! All configuration is programmatic and fixed at construction: the agent
//! catalog, process-wide default policies, per-(agent, engine) overrides,
//! and the worker pool size.

use crate::policy::PolicySet;
use std::time::Duration;

/// Policy overrides for one (agent, engine) attachment
#[derive(Clone)]
pub struct PolicyBinding {
    pub agent_id: String,
    pub engine_id: String,
    pub policies: PolicySet,
}

impl PolicyBinding {
    pub fn new(
        agent_id: impl Into<String>,
        engine_id: impl Into<String>,
        policies: PolicySet,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            engine_id: engine_id.into(),
            policies,
        }
    }
}

/// Construction-time kernel settings
#[derive(Clone)]
pub struct KernelConfig {
    /// Concurrent worker tasks draining mailboxes
    /// (default: half the available cores, minimum 1)
    pub worker_count: usize,

    /// Worker sleep when no agent is eligible (default: 25ms)
    pub idle_backoff: Duration,

    /// Enqueue delay applied to deferred admissions (default: 50ms)
    pub defer_delay: Duration,

    /// Throughput sampling period (default: 500ms)
    pub sample_interval: Duration,

    /// Process-wide default policies; unset slots use the built-ins
    pub defaults: PolicySet,

    /// Per-(agent, engine) policy overrides
    pub bindings: Vec<PolicyBinding>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_count: (cores / 2).max(1),
            idle_backoff: Duration::from_millis(25),
            defer_delay: Duration::from_millis(50),
            sample_interval: Duration::from_millis(500),
            defaults: PolicySet::default(),
            bindings: Vec::new(),
        }
    }
}

impl KernelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn with_defaults(mut self, defaults: PolicySet) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_binding(mut self, binding: PolicyBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.idle_backoff, Duration::from_millis(25));
        assert_eq!(config.defer_delay, Duration::from_millis(50));
        assert_eq!(config.sample_interval, Duration::from_millis(500));
        assert!(config.bindings.is_empty());
    }

    #[test]
    fn test_worker_count_floor() {
        let config = KernelConfig::new().with_worker_count(0);
        assert_eq!(config.worker_count, 1);
    }
}
