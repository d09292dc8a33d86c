// src/main.rs
//! Swarm Lab kernel demo
//!
//! Minimal wiring-layer stand-in: registers a few toy agents, pushes a
//! burst of work items through the kernel, and dumps a snapshot. Real
//! hosts assemble agents, engines, and kernel from their own config.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swarmlab_kernel::{
    Agent, AgentContext, InMemoryAgentCatalog, Kernel, KernelConfig, WorkItem, WorkItemKind,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Toy agent that sleeps for a fixed duration per item
struct SleepyAgent {
    id: String,
    work: Duration,
}

#[async_trait]
impl Agent for SleepyAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn handle(
        &self,
        item: Arc<WorkItem>,
        ctx: AgentContext,
    ) -> swarmlab_kernel::Result<()> {
        // shutdown may have canceled the dispatch before we got scheduled
        if ctx.is_cancelled() {
            return Err(swarmlab_kernel::KernelError::Canceled);
        }

        info!(agent = %self.id, item = %item.id, attempt = ctx.attempt, "handling");
        tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(swarmlab_kernel::KernelError::Canceled),
            _ = tokio::time::sleep(self.work) => Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("starting swarmlab-kernel demo v{}", swarmlab_kernel::VERSION);

    let mut catalog = InMemoryAgentCatalog::new();
    for (id, work_ms) in [("alpha", 15), ("beta", 40), ("gamma", 5)] {
        catalog.register(Arc::new(SleepyAgent {
            id: id.to_string(),
            work: Duration::from_millis(work_ms),
        }));
    }
    let agent_ids: Vec<&str> = vec!["alpha", "beta", "gamma"];

    let kernel = Kernel::new(Arc::new(catalog), KernelConfig::default());
    kernel.start()?;

    for i in 0..60 {
        let target = agent_ids[i % agent_ids.len()];
        let item = WorkItem::new(target, "demo-engine", WorkItemKind::Job)
            .with_priority((i % 5) as i32)
            .with_metadata("batch", "demo");
        kernel.enqueue(item);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    let snapshot = kernel.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    kernel.stop().await;
    info!("demo finished");
    Ok(())
}
