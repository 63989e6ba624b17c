// Teardown Monitor - Cancels tasks orphaned by context destruction
//
// Per context: Active -> TearingDown -> Gone. Entering TearingDown cancels and
// retires every task the context owns; Gone is terminal and frees the slot.
// Cancelled outcomes of a dying context are never queued, since there is
// nothing left to resume.

use std::sync::Arc;

use latent_types::{ContextId, ContextPhase};

use crate::context::ContextTable;
use crate::platform::EnginePlatform;
use crate::registry::TaskRegistry;

/// Drives context teardown and sweeps the tasks it orphans
pub struct TeardownMonitor {
    contexts: Arc<ContextTable>,
    registry: Arc<TaskRegistry>,
    platform: Arc<dyn EnginePlatform>,
}

impl TeardownMonitor {
    pub fn new(
        contexts: Arc<ContextTable>,
        registry: Arc<TaskRegistry>,
        platform: Arc<dyn EnginePlatform>,
    ) -> Self {
        Self {
            contexts,
            registry,
            platform,
        }
    }

    /// Enter `TearingDown` and cancel everything `id` owns
    ///
    /// Returns the number of tasks cancelled, or `None` if the context was not
    /// active.
    pub fn begin(&self, id: ContextId) -> Option<usize> {
        if !self.contexts.begin_teardown(id) {
            tracing::debug!(context = %id, phase = %self.contexts.phase(id), "Context not active; teardown skipped");
            return None;
        }

        let cancelled = self.registry.cancel_scope(id);
        for handle in &cancelled {
            self.platform.abandon(handle.token());
        }

        tracing::debug!(context = %id, cancelled = cancelled.len(), "Context tearing down");
        Some(cancelled.len())
    }

    /// Enter `Gone`
    pub fn finish(&self, id: ContextId) -> bool {
        let finished = self.contexts.finish_teardown(id);
        if finished {
            self.platform.release_context(id);
            tracing::debug!(context = %id, "Context gone");
        }
        finished
    }

    /// Both teardown steps; returns the number of tasks cancelled
    pub fn destroy(&self, id: ContextId) -> Option<usize> {
        let cancelled = self.begin(id)?;

        // Everything owned by `id` was swept; anything still here slipped in
        // concurrently and must not outlive the context.
        let stragglers = self.registry.tokens_for(id);
        if !stragglers.is_empty() {
            tracing::error!(context = %id, count = stragglers.len(), "Tasks survived context teardown");
        }
        let swept = self.registry.cancel_scope(id).len();

        self.finish(id);
        Some(cancelled + swept)
    }

    /// Destroy every active context
    pub fn teardown_all(&self) -> usize {
        self.contexts
            .active()
            .into_iter()
            .filter_map(|id| self.destroy(id))
            .sum()
    }

    pub fn phase(&self, id: ContextId) -> ContextPhase {
        self.contexts.phase(id)
    }
}

impl std::fmt::Debug for TeardownMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeardownMonitor")
            .field("active_contexts", &self.contexts.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::TaskHandle;
    use crate::platform::ManualPlatform;
    use latent_types::{ResumePoint, TaskState};

    fn setup() -> (Arc<ContextTable>, Arc<TaskRegistry>, Arc<ManualPlatform>, TeardownMonitor) {
        let contexts = Arc::new(ContextTable::new());
        let registry = Arc::new(TaskRegistry::new());
        let platform = ManualPlatform::new();
        let monitor = TeardownMonitor::new(
            Arc::clone(&contexts),
            Arc::clone(&registry),
            platform.clone(),
        );
        (contexts, registry, platform, monitor)
    }

    fn start(registry: &TaskRegistry, owner: ContextId) -> Arc<TaskHandle> {
        let handle = Arc::new(TaskHandle::new(
            registry.next_token(),
            "latent/Delay",
            owner,
            Some(ResumePoint::new("n")),
            None,
        ));
        registry.register(Arc::clone(&handle)).unwrap();
        handle
    }

    #[test]
    fn test_destroy_cancels_owned_tasks() {
        let (contexts, registry, platform, monitor) = setup();
        let doomed = contexts.spawn("doomed").unwrap();
        let other = contexts.spawn("other").unwrap();

        let a = start(&registry, doomed);
        let b = start(&registry, doomed);
        let c = start(&registry, other);

        assert_eq!(monitor.destroy(doomed), Some(2));
        assert_eq!(a.state(), TaskState::Cancelled);
        assert_eq!(b.state(), TaskState::Cancelled);
        assert!(c.is_pending());
        assert!(platform.was_abandoned(a.token()));
        assert!(platform.was_released(doomed));
        assert!(!platform.was_released(other));
        assert_eq!(registry.len(), 1);
        assert_eq!(monitor.phase(doomed), ContextPhase::Gone);
    }

    #[test]
    fn test_destroy_twice_is_noop() {
        let (contexts, _registry, platform, monitor) = setup();
        let ctx = contexts.spawn("ctx").unwrap();

        assert_eq!(monitor.destroy(ctx), Some(0));
        assert_eq!(monitor.destroy(ctx), None);
        assert!(platform.was_released(ctx));
    }

    #[test]
    fn test_teardown_all() {
        let (contexts, registry, _platform, monitor) = setup();
        let first = contexts.spawn("first").unwrap();
        let second = contexts.spawn("second").unwrap();
        start(&registry, first);
        start(&registry, second);
        start(&registry, second);

        assert_eq!(monitor.teardown_all(), 3);
        assert!(registry.is_empty());
        assert_eq!(contexts.active_count(), 0);
    }
}
