// src/kernel/mailbox.rs
//! Per-agent mailbox: queue, running state, and rolling statistics
//!
//! One mailbox exists per known agent id, created lazily on first enqueue
//! and kept for the kernel's lifetime. Everything inside is guarded by the
//! mailbox's own lock, so agents never contend with each other.
//!
//! `try_begin_dispatch` is the single-active mechanism: it atomically picks
//! an entry and marks the mailbox running, and fails while a dispatch is in
//! flight, no matter how many workers race for the same agent.

use crate::kernel::snapshot::AgentSnapshot;
use crate::policy::{AgentState, AgentView, EffectivePolicies, OrderingPolicy, RunningInvocation};
use crate::work_item::WorkItem;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A queued work item with its resolved policies and dequeue constraints
pub(crate) struct QueuedEntry {
    pub item: Arc<WorkItem>,
    pub policies: Arc<EffectivePolicies>,

    /// Never dequeued before this instant (deferred admission, retry backoff)
    pub not_before: Instant,

    /// Set by preemption: dequeue next, regardless of the ordering policy
    pub boosted: bool,
}

impl QueuedEntry {
    pub fn new(item: Arc<WorkItem>, policies: Arc<EffectivePolicies>, not_before: Instant) -> Self {
        Self {
            item,
            policies,
            not_before,
            boosted: false,
        }
    }
}

/// The dispatch currently executing for this agent
struct RunningDispatch {
    item: Arc<WorkItem>,
    started_at: Instant,
    cancel: CancellationToken,
}

/// Rolling per-agent statistics. Smoothed values use `old*0.8 + sample*0.2`.
struct MailboxStats {
    created: Instant,
    last_sample: Instant,
    active: Duration,
    avg_execution_ms: f64,
    queue_growth_rate: f64,
    handled: u64,
    rejected: u64,
    last_queue_len: usize,
}

struct MailboxInner {
    queue: Vec<QueuedEntry>,
    running: Option<RunningDispatch>,
    stats: MailboxStats,
}

/// Per-agent queue plus running-state plus statistics
pub(crate) struct Mailbox {
    agent_id: String,

    /// Ordering comparator fixed at mailbox creation
    ordering: Arc<dyn OrderingPolicy>,

    inner: Mutex<MailboxInner>,
}

impl Mailbox {
    pub fn new(agent_id: impl Into<String>, ordering: Arc<dyn OrderingPolicy>) -> Self {
        let now = Instant::now();
        Self {
            agent_id: agent_id.into(),
            ordering,
            inner: Mutex::new(MailboxInner {
                queue: Vec::new(),
                running: None,
                stats: MailboxStats {
                    created: now,
                    last_sample: now,
                    active: Duration::ZERO,
                    avg_execution_ms: 0.0,
                    queue_growth_rate: 0.0,
                    handled: 0,
                    rejected: 0,
                    last_queue_len: 0,
                },
            }),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn push(&self, entry: QueuedEntry) {
        self.inner.lock().queue.push(entry);
    }

    /// Mark an entry so it is dequeued next. No-op if the id is not queued.
    pub fn boost(&self, work_item_id: &str) {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.queue.iter_mut().find(|e| e.item.id == work_item_id) {
            entry.boosted = true;
        }
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn state(&self) -> AgentState {
        let guard = self.inner.lock();
        AgentState {
            is_running: guard.running.is_some(),
            queue_len: guard.queue.len(),
        }
    }

    /// Description of the running dispatch, if any, for preemption checks
    pub fn running_invocation(&self) -> Option<RunningInvocation> {
        let guard = self.inner.lock();
        guard.running.as_ref().map(|r| RunningInvocation {
            item: r.item.clone(),
            started_at: r.started_at,
        })
    }

    /// Cancel the in-flight dispatch's context (cooperative preemption)
    pub fn cancel_running(&self) {
        let guard = self.inner.lock();
        if let Some(running) = guard.running.as_ref() {
            running.cancel.cancel();
        }
    }

    pub fn increment_rejected(&self) {
        self.inner.lock().stats.rejected += 1;
    }

    /// Completed dispatch count, cheap accessor for the throughput sampler
    pub fn handled_count(&self) -> u64 {
        self.inner.lock().stats.handled
    }

    /// Atomically dequeue the best eligible entry and mark this mailbox
    /// running. Fails if a dispatch is already in flight, or if no entry has
    /// reached its not-before instant. The returned token is a child of
    /// `parent` and is what preemption and timeout cancel.
    pub fn try_begin_dispatch(
        &self,
        parent: &CancellationToken,
    ) -> Option<(QueuedEntry, CancellationToken)> {
        let mut guard = self.inner.lock();
        if guard.running.is_some() {
            return None;
        }

        let now = Instant::now();
        let mut best: Option<usize> = None;
        for (i, entry) in guard.queue.iter().enumerate() {
            if entry.not_before > now {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let current = &guard.queue[b];
                    let wins = if entry.boosted != current.boosted {
                        entry.boosted
                    } else {
                        self.ordering.compare(&entry.item, &current.item) == Ordering::Less
                    };
                    if wins {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }

        let entry = guard.queue.remove(best?);
        let cancel = parent.child_token();
        guard.running = Some(RunningDispatch {
            item: entry.item.clone(),
            started_at: now,
            cancel: cancel.clone(),
        });
        Some((entry, cancel))
    }

    /// Mark idle and fold the elapsed execution time into the statistics.
    /// Called once per dispatch regardless of outcome.
    pub fn finish_dispatch(&self, elapsed: Duration) {
        let mut guard = self.inner.lock();
        if guard.running.take().is_some() {
            let stats = &mut guard.stats;
            stats.active += elapsed;
            stats.handled += 1;
            stats.avg_execution_ms =
                stats.avg_execution_ms * 0.8 + elapsed.as_secs_f64() * 1000.0 * 0.2;
        }
    }

    /// Lightweight view for scheduling decisions
    pub fn view(&self) -> AgentView {
        let guard = self.inner.lock();
        AgentView {
            id: self.agent_id.clone(),
            queue_len: guard.queue.len(),
            is_running: guard.running.is_some(),
            utilization_percent: utilization(&guard.stats),
            avg_execution_ms: guard.stats.avg_execution_ms,
        }
    }

    /// Point-in-time snapshot. Updates the queue-growth smoothing lazily,
    /// on read.
    pub fn snapshot(&self) -> AgentSnapshot {
        let mut guard = self.inner.lock();
        let queue_len = guard.queue.len();
        let is_running = guard.running.is_some();

        let now = Instant::now();
        let stats = &mut guard.stats;
        let dt = now.duration_since(stats.last_sample).as_secs_f64();
        if dt > 0.0 {
            let growth = (queue_len as f64 - stats.last_queue_len as f64) / dt;
            stats.queue_growth_rate = stats.queue_growth_rate * 0.8 + growth * 0.2;
        }
        stats.last_sample = now;
        stats.last_queue_len = queue_len;

        AgentSnapshot {
            id: self.agent_id.clone(),
            queue_length: queue_len,
            is_running,
            total_handled: stats.handled,
            rejected: stats.rejected,
            avg_execution_ms: round1(stats.avg_execution_ms),
            queue_growth_rate: round1(stats.queue_growth_rate),
            utilization_percent: round1(utilization(stats)),
        }
    }
}

fn utilization(stats: &MailboxStats) -> f64 {
    let uptime = stats.created.elapsed().as_secs_f64();
    if uptime <= 0.0 {
        return 0.0;
    }
    (stats.active.as_secs_f64() / uptime * 100.0).clamp(0.0, 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PriorityOrderingPolicy;
    use crate::work_item::WorkItemKind;

    fn mailbox() -> Mailbox {
        Mailbox::new("a", Arc::new(PriorityOrderingPolicy))
    }

    fn entry(id: &str, priority: i32) -> QueuedEntry {
        let item = WorkItem::new("a", "e", WorkItemKind::Job)
            .with_id(id)
            .with_priority(priority);
        QueuedEntry::new(
            Arc::new(item),
            Arc::new(EffectivePolicies::builtin()),
            Instant::now(),
        )
    }

    #[test]
    fn test_dequeue_follows_ordering() {
        let mb = mailbox();
        mb.push(entry("low", 0));
        mb.push(entry("high", 10));

        let parent = CancellationToken::new();
        let (first, _) = mb.try_begin_dispatch(&parent).unwrap();
        assert_eq!(first.item.id, "high");
    }

    #[test]
    fn test_single_active_while_running() {
        let mb = mailbox();
        mb.push(entry("one", 0));
        mb.push(entry("two", 0));

        let parent = CancellationToken::new();
        let lease = mb.try_begin_dispatch(&parent);
        assert!(lease.is_some());

        // second dequeue must fail until the first dispatch finishes
        assert!(mb.try_begin_dispatch(&parent).is_none());

        mb.finish_dispatch(Duration::from_millis(10));
        assert!(mb.try_begin_dispatch(&parent).is_some());
    }

    #[test]
    fn test_not_before_gating() {
        let mb = mailbox();
        let mut deferred = entry("later", 10);
        deferred.not_before = Instant::now() + Duration::from_secs(60);
        mb.push(deferred);
        mb.push(entry("now", 0));

        let parent = CancellationToken::new();
        let (picked, _) = mb.try_begin_dispatch(&parent).unwrap();
        assert_eq!(picked.item.id, "now");
        mb.finish_dispatch(Duration::from_millis(1));

        // only the gated entry remains; nothing is eligible yet
        assert!(mb.try_begin_dispatch(&parent).is_none());
        assert_eq!(mb.queue_len(), 1);
    }

    #[test]
    fn test_boosted_beats_ordering() {
        let mb = mailbox();
        mb.push(entry("urgent", 100));
        mb.push(entry("boosted", 0));
        mb.boost("boosted");

        let parent = CancellationToken::new();
        let (picked, _) = mb.try_begin_dispatch(&parent).unwrap();
        assert_eq!(picked.item.id, "boosted");
    }

    #[test]
    fn test_cancel_running_fires_dispatch_token() {
        let mb = mailbox();
        mb.push(entry("one", 0));

        let parent = CancellationToken::new();
        let (_, cancel) = mb.try_begin_dispatch(&parent).unwrap();
        assert!(!cancel.is_cancelled());

        mb.cancel_running();
        assert!(cancel.is_cancelled());
        // parent token is unaffected
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_stats_update_on_finish() {
        let mb = mailbox();
        mb.push(entry("one", 0));

        let parent = CancellationToken::new();
        mb.try_begin_dispatch(&parent).unwrap();
        mb.finish_dispatch(Duration::from_millis(100));

        let snap = mb.snapshot();
        assert_eq!(snap.total_handled, 1);
        assert!(snap.avg_execution_ms > 0.0);
        assert!((0.0..=100.0).contains(&snap.utilization_percent));
        assert!(!snap.is_running);
    }

    #[test]
    fn test_rejected_counter() {
        let mb = mailbox();
        mb.increment_rejected();
        mb.increment_rejected();
        assert_eq!(mb.snapshot().rejected, 2);
    }
}
