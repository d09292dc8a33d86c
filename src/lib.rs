// src/lib.rs
//! Swarm Lab work-item kernel
//!
//! An in-process runtime that schedules and dispatches work items to a
//! population of independently-identified agents, each executing at most
//! one item at a time, under pluggable policies for admission, ordering,
//! retry, timeout, cooperative preemption, backpressure, and cross-agent
//! scheduling fairness.
//!
//! # Architecture
//!
//! - **work_item**: the immutable unit of work (id, kind, priority,
//!   deadline, payload)
//! - **agent**: the handler contract and the lookup-only catalog
//! - **policy**: seven swappable decision strategies plus their built-in
//!   defaults
//! - **kernel**: mailboxes, the worker pool, and snapshots
//! - **config**: construction-time settings and per-attachment bindings
//!
//! Delivery is at-least-once within the process; queued work does not
//! survive a restart. Admission outcomes (shed, reject, defer) are silent
//! decisions surfaced only through tracing and snapshot counters.

pub mod agent;
pub mod config;
pub mod error;
pub mod kernel;
pub mod policy;
pub mod work_item;

// Re-export commonly used types
pub use agent::{Agent, AgentCatalog, AgentContext, InMemoryAgentCatalog};
pub use config::{KernelConfig, PolicyBinding};
pub use error::{KernelError, Result};
pub use kernel::{AgentSnapshot, Kernel, KernelSnapshot};
pub use policy::PolicySet;
pub use work_item::{WorkItem, WorkItemKind};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
