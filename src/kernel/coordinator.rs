// src/kernel/coordinator.rs
//! The kernel coordinator: mailbox table, worker pool, and dispatch loop
//!
//! `Kernel` owns one mailbox per agent id and a fixed pool of worker tasks
//! draining them. `enqueue` is synchronous and lock-bounded: it runs the
//! backpressure and admission gates, inserts into the target mailbox, and
//! evaluates preemption when the agent is busy. It never blocks on dispatch
//! and never errors for ordinary admission outcomes.
//!
//! Each worker repeatedly asks the scheduling policy for an agent (under a
//! short selection lock), performs the mailbox's atomic
//! dequeue-and-mark-running, and executes the handler outside every lock.
//! Cancellation is one signal per dispatch: a child of the shutdown token
//! that timeout and cooperative preemption both cancel.

use crate::agent::{AgentCatalog, AgentContext};
use crate::config::KernelConfig;
use crate::error::{KernelError, Result};
use crate::kernel::mailbox::{Mailbox, QueuedEntry};
use crate::kernel::snapshot::KernelSnapshot;
use crate::policy::{
    AdmissionDecision, BackpressureDecision, ClusterLoad, EffectivePolicies, PreemptionDecision,
    SchedulingContext,
};
use crate::work_item::WorkItem;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Smoothed process-wide throughput, updated only by the sampler task
struct ThroughputMeter {
    smoothed: f64,
    last_handled: u64,
    last_sample: Instant,
}

struct KernelInner {
    catalog: Arc<dyn AgentCatalog>,

    /// Process-wide defaults, every slot resolved to a concrete strategy
    defaults: Arc<EffectivePolicies>,

    /// Resolved per-(agent, engine) overrides
    bindings: HashMap<(String, String), Arc<EffectivePolicies>>,

    /// Guarded only for lookup/insert of whole mailboxes
    mailboxes: RwLock<HashMap<String, Arc<Mailbox>>>,

    /// 1-based attempt count per work item id, pruned on terminal outcomes
    attempts: DashMap<String, u32>,

    /// Dispatches currently in flight across all agents
    running_count: AtomicUsize,

    /// Held only while a scheduling strategy picks an agent
    select_lock: Mutex<()>,

    shutdown: CancellationToken,
    throughput: Mutex<ThroughputMeter>,

    idle_backoff: Duration,
    defer_delay: Duration,
    sample_interval: Duration,
}

/// Work-item kernel: schedules and dispatches items to agents under
/// pluggable policies, guaranteeing at most one in-flight dispatch per
/// agent. Delivery is at-least-once within the process.
pub struct Kernel {
    inner: Arc<KernelInner>,
    worker_count: usize,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Kernel {
    pub fn new(catalog: Arc<dyn AgentCatalog>, config: KernelConfig) -> Self {
        let defaults = Arc::new(config.defaults.resolve_with(&EffectivePolicies::builtin()));
        let bindings = config
            .bindings
            .iter()
            .map(|b| {
                (
                    (b.agent_id.clone(), b.engine_id.clone()),
                    Arc::new(b.policies.resolve_with(&defaults)),
                )
            })
            .collect();

        Self {
            inner: Arc::new(KernelInner {
                catalog,
                defaults,
                bindings,
                mailboxes: RwLock::new(HashMap::new()),
                attempts: DashMap::new(),
                running_count: AtomicUsize::new(0),
                select_lock: Mutex::new(()),
                shutdown: CancellationToken::new(),
                throughput: Mutex::new(ThroughputMeter {
                    smoothed: 0.0,
                    last_handled: 0,
                    last_sample: Instant::now(),
                }),
                idle_backoff: config.idle_backoff,
                defer_delay: config.defer_delay,
                sample_interval: config.sample_interval,
            }),
            worker_count: config.worker_count,
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool and the throughput sampler.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(KernelError::Lifecycle("kernel already started".into()));
        }

        info!(workers = self.worker_count, "kernel starting");

        let mut tasks = self.tasks.lock();
        for worker_id in 0..self.worker_count {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(worker_loop(inner, worker_id)));
        }
        let inner = Arc::clone(&self.inner);
        tasks.push(tokio::spawn(sampler_loop(inner)));

        info!("kernel started");
        Ok(())
    }

    /// Cancel all in-flight dispatches and wait for workers and the sampler
    /// to exit. Safe to call once; repeat calls are no-ops.
    pub async fn stop(&self) {
        info!("kernel stopping");
        self.inner.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        join_all(tasks).await;

        info!("kernel stopped");
    }

    /// Submit a work item. Fire-and-forget: shed, reject, and defer are
    /// silent decisions, not errors, and this never blocks on dispatch.
    pub fn enqueue(&self, item: WorkItem) {
        let inner = &self.inner;
        let policies = inner.resolve(&item.agent_id, &item.engine_id);

        // Backpressure: cluster-wide, before any mailbox is touched
        match policies.backpressure.evaluate(inner.cluster_load()) {
            BackpressureDecision::Shed => {
                debug!(item = %item.describe(), "shed");
                return;
            }
            BackpressureDecision::Throttle => {
                // reserved: reported but not yet enforced beyond Normal
                debug!(item = %item.describe(), "throttle");
            }
            BackpressureDecision::Normal => {}
        }

        // Admission: per-agent
        let mailbox = inner.mailbox_for(&item.agent_id, &policies);
        let decision = policies.admission.admit(&item, &mailbox.state());
        let item = Arc::new(item);

        match decision {
            AdmissionDecision::Reject => {
                mailbox.increment_rejected();
                debug!(item = %item.describe(), "rejected");
                return;
            }
            AdmissionDecision::Defer => {
                let not_before = Instant::now() + inner.defer_delay;
                mailbox.push(QueuedEntry::new(item, policies, not_before));
                return;
            }
            AdmissionDecision::Accept => {
                mailbox.push(QueuedEntry::new(item.clone(), policies.clone(), Instant::now()));
            }
        }

        // Preemption: only relevant when the agent is mid-dispatch
        if let Some(running) = mailbox.running_invocation() {
            if policies.preemption.should_preempt(&item, &running) == PreemptionDecision::Cooperative
            {
                debug!(
                    incoming = %item.id,
                    current = %running.item.id,
                    "cooperative preemption requested"
                );
                mailbox.cancel_running();
                mailbox.boost(&item.id);
            }
        }
    }

    /// Read-only aggregate of kernel state. Recomputed per call; the only
    /// internal effect is advancing the lazy smoothing state.
    pub fn snapshot(&self) -> KernelSnapshot {
        let mailboxes = self.inner.collect_mailboxes();
        let agents: Vec<_> = mailboxes.iter().map(|m| m.snapshot()).collect();

        KernelSnapshot {
            total_agents: agents.len(),
            running_agents: agents.iter().filter(|a| a.is_running).count(),
            queued_items: agents.iter().map(|a| a.queue_length).sum(),
            rejected_items: agents.iter().map(|a| a.rejected).sum(),
            total_handled_items: agents.iter().map(|a| a.total_handled).sum(),
            throughput_per_sec: {
                let meter = self.inner.throughput.lock();
                (meter.smoothed * 100.0).round() / 100.0
            },
            agents,
            timestamp: Utc::now(),
        }
    }
}

impl KernelInner {
    fn resolve(&self, agent_id: &str, engine_id: &str) -> Arc<EffectivePolicies> {
        self.bindings
            .get(&(agent_id.to_string(), engine_id.to_string()))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.defaults))
    }

    /// Mailboxes in stable id order; the round-robin cursor indexes into
    /// this list, so the order must not shift as mailboxes are added.
    fn collect_mailboxes(&self) -> Vec<Arc<Mailbox>> {
        let mut mailboxes: Vec<Arc<Mailbox>> =
            self.mailboxes.read().values().cloned().collect();
        mailboxes.sort_by(|a, b| a.agent_id().cmp(b.agent_id()));
        mailboxes
    }

    fn cluster_load(&self) -> ClusterLoad {
        let total_queued = self
            .mailboxes
            .read()
            .values()
            .map(|m| m.queue_len())
            .sum();
        ClusterLoad {
            total_queued,
            total_running: self.running_count.load(Ordering::SeqCst),
        }
    }

    /// Look up the agent's mailbox, creating it lazily on first enqueue.
    /// The ordering comparator is fixed at creation.
    fn mailbox_for(&self, agent_id: &str, policies: &Arc<EffectivePolicies>) -> Arc<Mailbox> {
        if let Some(existing) = self.mailboxes.read().get(agent_id) {
            return Arc::clone(existing);
        }
        let mut table = self.mailboxes.write();
        Arc::clone(
            table
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mailbox::new(agent_id, policies.ordering.clone()))),
        )
    }

    /// Pick an agent and atomically claim its next entry. Tries the
    /// scheduling policy's choice first, then the remaining eligible agents
    /// in table order (another worker may have won the race).
    fn next_dispatch(&self) -> Option<Dispatch> {
        let mailboxes = self.collect_mailboxes();
        if mailboxes.is_empty() {
            return None;
        }

        let views: Vec<_> = mailboxes.iter().map(|m| m.view()).collect();
        let ctx = SchedulingContext {
            total_running: self.running_count.load(Ordering::SeqCst),
            total_queued: views.iter().map(|v| v.queue_len).sum(),
            now: Instant::now(),
        };

        let selected = {
            let _guard = self.select_lock.lock();
            self.defaults.scheduling.select_next(&views, &ctx)
        };

        if let Some(agent_id) = &selected {
            if let Some(mailbox) = mailboxes.iter().find(|m| m.agent_id() == agent_id.as_str()) {
                if let Some((entry, cancel)) = mailbox.try_begin_dispatch(&self.shutdown) {
                    return Some(Dispatch {
                        mailbox: Arc::clone(mailbox),
                        entry,
                        cancel,
                    });
                }
            }
        }

        for (mailbox, view) in mailboxes.iter().zip(&views) {
            if !view.is_eligible() || Some(&view.id) == selected.as_ref() {
                continue;
            }
            if let Some((entry, cancel)) = mailbox.try_begin_dispatch(&self.shutdown) {
                return Some(Dispatch {
                    mailbox: Arc::clone(mailbox),
                    entry,
                    cancel,
                });
            }
        }
        None
    }

    async fn run_dispatch(&self, dispatch: Dispatch) {
        let item = Arc::clone(&dispatch.entry.item);
        let policies = Arc::clone(&dispatch.entry.policies);
        self.running_count.fetch_add(1, Ordering::SeqCst);

        let attempt = {
            let mut entry = self.attempts.entry(item.id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let ctx = AgentContext::new(&item, attempt, dispatch.cancel.clone());
        let timeout = policies.timeout.timeout_for(&item);
        debug!(item = %item.describe(), attempt, "dispatch");

        let started = Instant::now();
        let outcome = match self.catalog.get(&item.agent_id) {
            Some(agent) => {
                execute_handler(
                    agent.handle(Arc::clone(&item), ctx),
                    &dispatch.cancel,
                    timeout,
                )
                .await
            }
            None => DispatchOutcome::Failed(KernelError::AgentNotFound(item.agent_id.clone())),
        };
        let elapsed = started.elapsed();

        // Statistics update regardless of outcome
        dispatch.mailbox.finish_dispatch(elapsed);
        self.running_count.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            DispatchOutcome::Completed => {
                debug!(item = %item.id, elapsed_ms = elapsed.as_millis() as u64, "complete");
                self.attempts.remove(&item.id);
            }
            DispatchOutcome::Canceled => {
                // timeout, preemption, or shutdown; never retried
                debug!(item = %item.id, "canceled");
                self.attempts.remove(&item.id);
            }
            DispatchOutcome::Failed(error) => {
                let decision = policies.retry.on_failure(&item, &error, attempt);
                if decision.should_retry {
                    let delay = decision.delay.unwrap_or_default();
                    warn!(
                        item = %item.describe(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "failed, retrying"
                    );
                    let not_before = Instant::now() + delay;
                    dispatch
                        .mailbox
                        .push(QueuedEntry::new(item, policies, not_before));
                } else {
                    warn!(
                        item = %item.describe(),
                        attempt,
                        reason = decision.reason.as_deref().unwrap_or("unspecified"),
                        %error,
                        "failed, dropped"
                    );
                    self.attempts.remove(&item.id);
                }
            }
        }
    }

    fn sample_throughput(&self) {
        let handled: u64 = self
            .mailboxes
            .read()
            .values()
            .map(|m| m.handled_count())
            .sum();

        let mut meter = self.throughput.lock();
        let now = Instant::now();
        let dt = now.duration_since(meter.last_sample).as_secs_f64();
        if dt > 0.0 {
            let current = handled.saturating_sub(meter.last_handled) as f64 / dt;
            meter.smoothed = meter.smoothed * 0.8 + current * 0.2;
        }
        meter.last_handled = handled;
        meter.last_sample = now;
    }
}

/// A claimed mailbox entry, ready to execute
struct Dispatch {
    mailbox: Arc<Mailbox>,
    entry: QueuedEntry,
    cancel: CancellationToken,
}

enum DispatchOutcome {
    Completed,
    Canceled,
    Failed(KernelError),
}

/// Drive a handler to completion under one cancellation signal. A timeout
/// cancels the dispatch token and then keeps waiting: cancellation is
/// cooperative, the handler decides when to actually stop.
async fn execute_handler(
    fut: impl std::future::Future<Output = Result<()>> + Unpin,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> DispatchOutcome {
    let mut fut = fut;
    let result = match timeout {
        Some(limit) if limit > Duration::ZERO => {
            tokio::select! {
                result = &mut fut => result,
                _ = tokio::time::sleep(limit) => {
                    cancel.cancel();
                    fut.await
                }
            }
        }
        _ => (&mut fut).await,
    };

    if cancel.is_cancelled() {
        return DispatchOutcome::Canceled;
    }
    match result {
        Ok(()) => DispatchOutcome::Completed,
        Err(error) if error.is_cancellation() => DispatchOutcome::Canceled,
        Err(error) => DispatchOutcome::Failed(error),
    }
}

async fn worker_loop(inner: Arc<KernelInner>, worker_id: usize) {
    debug!(worker_id, "worker started");
    loop {
        if inner.shutdown.is_cancelled() {
            break;
        }
        match inner.next_dispatch() {
            Some(dispatch) => inner.run_dispatch(dispatch).await,
            None => {
                tokio::select! {
                    _ = inner.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(inner.idle_backoff) => {}
                }
            }
        }
    }
    debug!(worker_id, "worker exited");
}

async fn sampler_loop(inner: Arc<KernelInner>) {
    let mut ticker = tokio::time::interval(inner.sample_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => inner.sample_throughput(),
        }
    }
    debug!("sampler exited");
}
