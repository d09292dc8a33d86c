// src/work_item.rs
//! Work items: the unit of work addressed to a single agent
//!
//! A `WorkItem` is immutable once created. Retried attempts reuse the same
//! item (and therefore the same id), which is how the kernel keeps the
//! per-item attempt counter monotonic across re-enqueues.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ulid::Ulid;

/// Kind of work item. Closed set; the kernel treats all kinds identically
/// and engines decide which kind to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemKind {
    /// External stimulus routed to an agent
    Percept,
    /// Periodic heartbeat from a tick engine
    Tick,
    /// Imperative instruction
    Command,
    /// Background unit of work
    Job,
}

/// A unit of work addressed to one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique id per logical unit of work (shared across retry attempts)
    pub id: String,

    /// Engine that originated this item
    pub engine_id: String,

    /// Target agent
    pub agent_id: String,

    /// Item kind (opaque to kernel scheduling)
    pub kind: WorkItemKind,

    /// Opaque payload, interpreted only by the agent handler
    pub payload: Option<serde_json::Value>,

    /// Higher runs earlier. Default = 0.
    pub priority: i32,

    /// Optional absolute deadline
    pub deadline: Option<DateTime<Utc>>,

    /// Optional correlation id for tracing across items
    pub correlation_id: Option<String>,

    /// Free-form metadata
    pub metadata: HashMap<String, String>,
}

impl WorkItem {
    /// Create a work item with a fresh ulid id and default priority.
    pub fn new(
        agent_id: impl Into<String>,
        engine_id: impl Into<String>,
        kind: WorkItemKind,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            engine_id: engine_id.into(),
            agent_id: agent_id.into(),
            kind,
            payload: None,
            priority: 0,
            deadline: None,
            correlation_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Override the generated id (e.g. for idempotent producers)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Short human-readable description used in log lines
    pub fn describe(&self) -> String {
        format!(
            "[{:?}] agent={} engine={} id={}",
            self.kind, self.agent_id, self.engine_id, self.id
        )
    }
}
