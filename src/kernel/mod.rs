// src/kernel/mod.rs
//! Kernel coordinator: per-agent mailboxes drained by a worker pool
//!
//! This module holds the only real concurrency coordination in the crate:
//!
//! - **Mailbox**: per-agent queue, running flag, and rolling statistics,
//!   each guarded by its own lock
//! - **Coordinator**: the mailbox table, the enqueue gates (backpressure,
//!   admission, preemption), the worker loop, and retry handling
//! - **Snapshot**: read-only aggregates for external observability
//!
//! The load-bearing invariant is single-active-per-agent: for any agent id,
//! at most one dispatch is in flight at any instant, enforced by the
//! mailbox's atomic dequeue-and-mark-running even when multiple workers
//! race for the same agent.

pub(crate) mod mailbox;

pub mod coordinator;
pub mod snapshot;

pub use coordinator::Kernel;
pub use snapshot::{AgentSnapshot, KernelSnapshot};
