// src/agent.rs
//! Agent contract and catalog
//!
//! Agents are implemented by collaborators and invoked by the kernel. The
//! kernel only needs two things from the outside world: a handler per agent
//! (`Agent`) and a way to look handlers up by id (`AgentCatalog`).

use crate::error::Result;
use crate::work_item::WorkItem;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-dispatch execution context handed to the agent handler
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Target agent id
    pub agent_id: String,

    /// Engine that originated the item
    pub engine_id: String,

    /// Id of the work item being handled
    pub work_item_id: String,

    /// Correlation id, if the producer set one
    pub correlation_id: Option<String>,

    /// 1-based attempt number for this item
    pub attempt: u32,

    /// Cancellation for preemption, timeouts, and shutdown.
    /// One signal regardless of cause; handlers must observe it.
    pub cancellation: CancellationToken,

    /// Deterministic seed derived from the item id, for reproducible
    /// randomized behavior in handlers and tests
    pub random_seed: u64,
}

impl AgentContext {
    pub(crate) fn new(item: &WorkItem, attempt: u32, cancellation: CancellationToken) -> Self {
        let mut hasher = DefaultHasher::new();
        item.id.hash(&mut hasher);

        Self {
            agent_id: item.agent_id.clone(),
            engine_id: item.engine_id.clone(),
            work_item_id: item.id.clone(),
            correlation_id: item.correlation_id.clone(),
            attempt,
            cancellation,
            random_seed: hasher.finish(),
        }
    }

    /// True once the dispatch has been canceled (timeout, preemption, or
    /// shutdown). Long-running handlers should poll this or await
    /// `cancellation.cancelled()`.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Handler for work items addressed to one agent id
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent id this handler serves
    fn id(&self) -> &str;

    /// Handle one work item. Must respect `ctx.cancellation`; the kernel
    /// never hard-interrupts a handler.
    async fn handle(&self, item: Arc<WorkItem>, ctx: AgentContext) -> Result<()>;
}

/// Lookup-only agent resolver injected at kernel construction.
/// The kernel never mutates the catalog.
pub trait AgentCatalog: Send + Sync {
    /// Resolve an agent handler by id
    fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>>;

    /// List all known agent ids
    fn ids(&self) -> Vec<String>;
}

/// Simple map-backed catalog, sufficient for most hosts
#[derive(Default)]
pub struct InMemoryAgentCatalog {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl InMemoryAgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its own id. Last registration wins.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.id().to_string(), agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl AgentCatalog for InMemoryAgentCatalog {
    fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(agent_id).cloned()
    }

    fn ids(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItemKind;

    struct NoopAgent {
        id: String,
    }

    #[async_trait]
    impl Agent for NoopAgent {
        fn id(&self) -> &str {
            &self.id
        }

        async fn handle(&self, _item: Arc<WorkItem>, _ctx: AgentContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_catalog_lookup() {
        let mut catalog = InMemoryAgentCatalog::new();
        catalog.register(Arc::new(NoopAgent { id: "a".into() }));
        catalog.register(Arc::new(NoopAgent { id: "b".into() }));

        assert!(catalog.get("a").is_some());
        assert!(catalog.get("missing").is_none());

        let mut ids = catalog.ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_catalog_len_tracks_registrations() {
        let mut catalog = InMemoryAgentCatalog::new();
        assert!(catalog.is_empty());

        catalog.register(Arc::new(NoopAgent { id: "a".into() }));
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.is_empty());

        // re-registering the same id replaces, not grows
        catalog.register(Arc::new(NoopAgent { id: "a".into() }));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_context_reports_cancellation() {
        let item = WorkItem::new("a", "e", WorkItemKind::Job);
        let token = CancellationToken::new();
        let ctx = AgentContext::new(&item, 1, token.clone());

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_context_seed_is_deterministic() {
        let item = WorkItem::new("a", "e", WorkItemKind::Job).with_id("fixed");
        let c1 = AgentContext::new(&item, 1, CancellationToken::new());
        let c2 = AgentContext::new(&item, 2, CancellationToken::new());
        assert_eq!(c1.random_seed, c2.random_seed);
        assert_eq!(c1.attempt, 1);
        assert_eq!(c2.attempt, 2);
    }
}
