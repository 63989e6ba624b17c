// Task Registry - Session-scoped owner of live task handles
//
// Registration happens on the scripting thread; lookups, completion and
// cancellation may come from any platform thread. DashMap shards keep those
// paths from contending on a single lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use latent_types::{ContextId, TaskToken};

use crate::error::RegistryError;
use crate::handle::TaskHandle;

/// Registry of all live tasks in a session
///
/// Every `Pending` handle lives here; every handle removed from here is
/// terminal.
pub struct TaskRegistry {
    tasks: DashMap<TaskToken, Arc<TaskHandle>>,
    /// Outstanding task per (context, operation) for single-outstanding entry points
    exclusive: DashMap<(ContextId, &'static str), TaskToken>,
    next_token: AtomicU64,
    retired: AtomicU64,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            exclusive: DashMap::new(),
            next_token: AtomicU64::new(1),
            retired: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh token
    pub fn next_token(&self) -> TaskToken {
        TaskToken::new(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert a new pending handle, making it visible to `find`
    pub fn register(&self, handle: Arc<TaskHandle>) -> Result<TaskToken, RegistryError> {
        let token = handle.token();
        match self.tasks.entry(token) {
            Entry::Occupied(_) => {
                tracing::error!(token = %token, "Duplicate task token");
                Err(RegistryError::DuplicateToken(token))
            }
            Entry::Vacant(slot) => {
                tracing::debug!(
                    token = %token,
                    operation = handle.operation(),
                    context = %handle.owner(),
                    "Task registered"
                );
                slot.insert(handle);
                Ok(token)
            }
        }
    }

    /// Claim the single outstanding slot of `operation` for `owner`
    ///
    /// Returns the token already holding the slot if it is taken.
    pub(crate) fn reserve_exclusive(
        &self,
        owner: ContextId,
        operation: &'static str,
        token: TaskToken,
    ) -> Result<(), TaskToken> {
        match self.exclusive.entry((owner, operation)) {
            Entry::Occupied(mut held) => {
                let existing = *held.get();
                if self.find(existing).is_some_and(|h| h.is_pending()) {
                    return Err(existing);
                }
                held.insert(token);
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    /// Give up an exclusive slot claimed by `token`
    pub(crate) fn release_exclusive(
        &self,
        owner: ContextId,
        operation: &'static str,
        token: TaskToken,
    ) {
        self.exclusive
            .remove_if(&(owner, operation), |_, held| *held == token);
    }

    /// Remove a terminal handle
    ///
    /// Returns `Ok(None)` if the token is not registered (already retired).
    pub fn retire(&self, token: TaskToken) -> Result<Option<Arc<TaskHandle>>, RegistryError> {
        if let Some((_, handle)) = self.tasks.remove_if(&token, |_, h| !h.is_pending()) {
            self.release_exclusive(handle.owner(), handle.operation(), token);
            self.retired.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(token = %token, state = %handle.state(), "Task retired");
            return Ok(Some(handle));
        }

        if self.tasks.contains_key(&token) {
            tracing::error!(token = %token, "Attempted to retire a pending task");
            return Err(RegistryError::InvalidTeardown(token));
        }

        Ok(None)
    }

    /// Look up a live task
    pub fn find(&self, token: TaskToken) -> Option<Arc<TaskHandle>> {
        self.tasks.get(&token).map(|h| Arc::clone(h.value()))
    }

    /// Cancel and retire every pending task
    ///
    /// Returns the handles this call cancelled. Tasks completing concurrently
    /// from platform threads are retired by whichever side gets there first.
    pub fn cancel_all(&self) -> Vec<Arc<TaskHandle>> {
        self.cancel_where(|_| true)
    }

    /// Cancel and retire every pending task owned by `owner`
    pub fn cancel_scope(&self, owner: ContextId) -> Vec<Arc<TaskHandle>> {
        self.cancel_where(|h| h.owner() == owner)
    }

    fn cancel_where<F>(&self, filter: F) -> Vec<Arc<TaskHandle>>
    where
        F: Fn(&TaskHandle) -> bool,
    {
        // Snapshot first so no shard lock is held while cancelling.
        let snapshot: Vec<Arc<TaskHandle>> = self
            .tasks
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut cancelled = Vec::new();
        for handle in snapshot {
            if handle.cancel().is_applied() {
                cancelled.push(Arc::clone(&handle));
            }
            if let Err(e) = self.retire(handle.token()) {
                tracing::error!(token = %handle.token(), error = %e, "Failed to retire cancelled task");
            }
        }
        cancelled
    }

    /// Tokens of pending tasks owned by `owner`
    pub fn tokens_for(&self, owner: ContextId) -> Vec<TaskToken> {
        let mut tokens: Vec<_> = self
            .tasks
            .iter()
            .filter(|e| e.value().owner() == owner && e.value().is_pending())
            .map(|e| *e.key())
            .collect();
        tokens.sort();
        tokens
    }

    /// Number of pending tasks
    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|e| e.value().is_pending()).count()
    }

    /// Number of tasks retired over the registry's lifetime
    pub fn retired_count(&self) -> u64 {
        self.retired.load(Ordering::Relaxed)
    }

    /// Get registered task count
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.tasks.len())
            .field("retired", &self.retired_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latent_types::{ResumePoint, TaskPayload, TaskState};

    const CTX: ContextId = ContextId::new(0, 0);

    fn new_handle(registry: &TaskRegistry, owner: ContextId) -> Arc<TaskHandle> {
        Arc::new(TaskHandle::new(
            registry.next_token(),
            "latent/Delay",
            owner,
            Some(ResumePoint::new("n1")),
            None,
        ))
    }

    #[test]
    fn test_empty_registry() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_register_and_find() {
        let registry = TaskRegistry::new();
        let handle = new_handle(&registry, CTX);

        let token = registry.register(Arc::clone(&handle)).unwrap();
        assert_eq!(token, handle.token());
        assert!(registry.find(token).is_some());
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_duplicate_token() {
        let registry = TaskRegistry::new();
        let handle = new_handle(&registry, CTX);

        registry.register(Arc::clone(&handle)).unwrap();
        let result = registry.register(handle);
        assert!(matches!(result, Err(RegistryError::DuplicateToken(_))));
    }

    #[test]
    fn test_retire_requires_terminal_state() {
        let registry = TaskRegistry::new();
        let handle = new_handle(&registry, CTX);
        let token = registry.register(Arc::clone(&handle)).unwrap();

        assert_eq!(
            registry.retire(token).unwrap_err(),
            RegistryError::InvalidTeardown(token)
        );

        assert!(handle.complete(TaskPayload::Nothing).is_applied());
        let retired = registry.retire(token).unwrap();
        assert!(retired.is_some());
        assert!(registry.find(token).is_none());
        assert_eq!(registry.retired_count(), 1);

        // Already gone
        assert!(registry.retire(token).unwrap().is_none());
    }

    #[test]
    fn test_cancel_scope_only_touches_owner() {
        let registry = TaskRegistry::new();
        let other = ContextId::new(1, 0);

        let mine = new_handle(&registry, CTX);
        let theirs = new_handle(&registry, other);
        registry.register(Arc::clone(&mine)).unwrap();
        registry.register(Arc::clone(&theirs)).unwrap();

        let cancelled = registry.cancel_scope(CTX);
        assert_eq!(cancelled.len(), 1);
        assert_eq!(mine.state(), TaskState::Cancelled);
        assert!(theirs.is_pending());
        assert_eq!(registry.tokens_for(other), vec![theirs.token()]);
        assert!(registry.tokens_for(CTX).is_empty());
    }

    #[test]
    fn test_cancel_all_retires_completed_stragglers() {
        let registry = TaskRegistry::new();
        let done = new_handle(&registry, CTX);
        let waiting = new_handle(&registry, CTX);
        registry.register(Arc::clone(&done)).unwrap();
        registry.register(Arc::clone(&waiting)).unwrap();

        // Completed but not yet retired, as when a callback races teardown
        assert!(done.complete(TaskPayload::Nothing).is_applied());

        let cancelled = registry.cancel_all();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].token(), waiting.token());
        assert!(registry.is_empty());
        assert_eq!(done.state(), TaskState::Completed);
    }

    #[test]
    fn test_exclusive_slot() {
        let registry = TaskRegistry::new();
        let first = new_handle(&registry, CTX);
        registry
            .reserve_exclusive(CTX, "event/WaitForEvent", first.token())
            .unwrap();
        registry.register(Arc::clone(&first)).unwrap();

        let second = registry.next_token();
        assert_eq!(
            registry.reserve_exclusive(CTX, "event/WaitForEvent", second),
            Err(first.token())
        );

        assert!(first.cancel().is_applied());
        registry.retire(first.token()).unwrap();
        assert!(
            registry
                .reserve_exclusive(CTX, "event/WaitForEvent", second)
                .is_ok()
        );
    }
}
