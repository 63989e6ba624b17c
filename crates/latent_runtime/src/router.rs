// Completion Router - Marshals task outcomes onto the scripting tick
//
// Completion callbacks arrive from arbitrary threads. They only ever enqueue;
// the graph is resumed when the scripting thread drains the queue at its tick
// boundary.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use latent_types::{ContextPhase, Resumption, TaskOutcome};

use crate::context::ContextTable;
use crate::handle::TaskHandle;

// ─────────────────────────────────────────────────────────────────────────────
// Graph Resumer
// ─────────────────────────────────────────────────────────────────────────────

/// Receiver of drained resumptions, implemented by the scripting host
///
/// Called on the draining thread only, one resumption at a time.
pub trait GraphResumer {
    fn resume(&mut self, resumption: Resumption);
}

impl<F> GraphResumer for F
where
    F: FnMut(Resumption),
{
    fn resume(&mut self, resumption: Resumption) {
        self(resumption)
    }
}

impl GraphResumer for Vec<Resumption> {
    fn resume(&mut self, resumption: Resumption) {
        self.push(resumption);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Router
// ─────────────────────────────────────────────────────────────────────────────

/// FIFO queue of resumptions waiting for the next drain point
pub struct CompletionRouter {
    queue: Mutex<VecDeque<Resumption>>,
    contexts: Arc<ContextTable>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl CompletionRouter {
    pub fn new(contexts: Arc<ContextTable>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            contexts,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue the outcome of `handle` for delivery
    ///
    /// Internal tasks without a resume point are never queued. Returns whether
    /// a record was queued.
    pub fn enqueue(&self, handle: &TaskHandle, outcome: TaskOutcome) -> bool {
        let Some(resume) = handle.resume_point() else {
            return false;
        };

        let record = Resumption {
            token: handle.token(),
            owner: handle.owner(),
            resume: resume.clone(),
            outcome,
        };
        self.queue.lock().push_back(record);
        true
    }

    /// Deliver queued resumptions in completion order
    ///
    /// At most `limit` records are taken; the rest stay queued. Records whose
    /// owner is no longer active are dropped. Anything enqueued while the
    /// resumer runs waits for the next drain, so a resumer never re-enters
    /// itself. Returns the number delivered.
    pub fn drain(&self, resumer: &mut dyn GraphResumer, limit: Option<usize>) -> usize {
        let batch: Vec<Resumption> = {
            let mut queue = self.queue.lock();
            let take = limit.map_or(queue.len(), |n| n.min(queue.len()));
            queue.drain(..take).collect()
        };

        if batch.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        for record in batch {
            match self.contexts.phase(record.owner) {
                ContextPhase::Active => {
                    tracing::debug!(
                        token = %record.token,
                        context = %record.owner,
                        node = %record.resume.node_id,
                        pin = record.exec_pin(),
                        "Resuming graph"
                    );
                    resumer.resume(record);
                    delivered += 1;
                }
                phase => {
                    tracing::warn!(
                        token = %record.token,
                        context = %record.owner,
                        phase = %phase,
                        "Dropping resumption for dead context"
                    );
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        tracing::debug!(delivered, remaining = self.len(), "Drained completion queue");
        delivered
    }

    /// Discard everything queued, returning how many records were discarded
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        self.dropped.fetch_add(discarded as u64, Ordering::Relaxed);
        discarded
    }

    /// Number of queued resumptions
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Resumptions handed to a resumer over the router's lifetime
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Resumptions dropped or discarded over the router's lifetime
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CompletionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRouter")
            .field("queued", &self.len())
            .field("delivered", &self.delivered_count())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latent_types::{ContextId, ResumePoint, TaskPayload, TaskToken};

    fn handle(token: u64, owner: ContextId, node: &str) -> TaskHandle {
        TaskHandle::new(
            TaskToken::new(token),
            "latent/Delay",
            owner,
            Some(ResumePoint::new(node)),
            None,
        )
    }

    fn done() -> TaskOutcome {
        TaskOutcome::Completed {
            payload: TaskPayload::Nothing,
        }
    }

    #[test]
    fn test_drain_is_fifo() {
        let contexts = Arc::new(ContextTable::new());
        let ctx = contexts.spawn("player").unwrap();
        let router = CompletionRouter::new(contexts);

        router.enqueue(&handle(2, ctx, "b"), done());
        router.enqueue(&handle(1, ctx, "a"), done());

        let mut seen = Vec::new();
        assert_eq!(router.drain(&mut seen, None), 2);
        let nodes: Vec<_> = seen.iter().map(|r| r.resume.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["b", "a"]);
        assert!(router.is_empty());
    }

    #[test]
    fn test_drain_limit_keeps_remainder() {
        let contexts = Arc::new(ContextTable::new());
        let ctx = contexts.spawn("player").unwrap();
        let router = CompletionRouter::new(contexts);

        for i in 0..5 {
            router.enqueue(&handle(i, ctx, &format!("n{i}")), done());
        }

        let mut seen = Vec::new();
        assert_eq!(router.drain(&mut seen, Some(2)), 2);
        assert_eq!(router.len(), 3);
        assert_eq!(router.drain(&mut seen, None), 3);
        assert_eq!(seen[2].resume.node_id, "n2");
    }

    #[test]
    fn test_dead_owner_is_dropped() {
        let contexts = Arc::new(ContextTable::new());
        let alive = contexts.spawn("alive").unwrap();
        let doomed = contexts.spawn("doomed").unwrap();
        let router = CompletionRouter::new(Arc::clone(&contexts));

        router.enqueue(&handle(1, doomed, "x"), done());
        router.enqueue(&handle(2, alive, "y"), done());
        contexts.begin_teardown(doomed);
        contexts.finish_teardown(doomed);

        let mut seen = Vec::new();
        assert_eq!(router.drain(&mut seen, None), 1);
        assert_eq!(seen[0].token, TaskToken::new(2));
        assert_eq!(router.dropped_count(), 1);
    }

    #[test]
    fn test_internal_task_is_not_queued() {
        let contexts = Arc::new(ContextTable::new());
        let ctx = contexts.spawn("player").unwrap();
        let router = CompletionRouter::new(contexts);

        let timer = TaskHandle::new(TaskToken::new(9), "latent/Delay", ctx, None, None);
        assert!(!router.enqueue(&timer, done()));
        assert!(router.is_empty());
    }

    #[test]
    fn test_enqueue_during_drain_waits_for_next_tick() {
        let contexts = Arc::new(ContextTable::new());
        let ctx = contexts.spawn("player").unwrap();
        let router = Arc::new(CompletionRouter::new(contexts));
        router.enqueue(&handle(1, ctx, "first"), done());

        let inner = Arc::clone(&router);
        let mut count = 0;
        let mut resumer = |_: Resumption| {
            count += 1;
            inner.enqueue(&handle(2, ctx, "second"), done());
        };
        assert_eq!(router.drain(&mut resumer, None), 1);
        assert_eq!(count, 1);
        assert_eq!(router.len(), 1);
    }
}
