// src/kernel/snapshot.rs
//! Read-only kernel snapshots for external observability
//!
//! Snapshots are recomputed on each inspection call and never mutated by
//! consumers. All smoothed fields follow the `old*0.8 + sample*0.2` rule.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time aggregate over the whole kernel
#[derive(Debug, Clone, Serialize)]
pub struct KernelSnapshot {
    /// Mailboxes created so far (lazily, on first enqueue per agent)
    pub total_agents: usize,

    /// Agents with a dispatch currently in flight
    pub running_agents: usize,

    /// Sum of live mailbox queue lengths
    pub queued_items: usize,

    /// Admission rejections across all agents
    pub rejected_items: u64,

    /// Completed dispatches across all agents, regardless of outcome
    pub total_handled_items: u64,

    /// Smoothed process-wide throughput, sampled on a fixed period
    pub throughput_per_sec: f64,

    /// Per-agent detail
    pub agents: Vec<AgentSnapshot>,

    pub timestamp: DateTime<Utc>,
}

/// Point-in-time detail for one agent's mailbox
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub id: String,
    pub queue_length: usize,
    pub is_running: bool,
    pub total_handled: u64,
    pub rejected: u64,

    /// Smoothed execution time per dispatch, milliseconds
    pub avg_execution_ms: f64,

    /// Smoothed queued-items-per-second delta; negative while draining
    pub queue_growth_rate: f64,

    /// Active time over uptime, 0-100
    pub utilization_percent: f64,
}
