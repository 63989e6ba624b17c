//! Task Handle
//!
//! Identity and state record for one in-flight latent operation.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use latent_types::{ContextId, ResumePoint, TaskOutcome, TaskPayload, TaskState, TaskToken};

// ─────────────────────────────────────────────────────────────────────────────
// Transition
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a completion, failure or cancellation signal changed the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Transition {
    /// The handle left `Pending` because of this call
    Applied,
    /// The handle was already terminal; the call was a no-op
    Ignored,
}

impl Transition {
    pub fn is_applied(self) -> bool {
        self == Transition::Applied
    }
}

/// Relationship between two tasks racing each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskLink {
    /// When this task settles, cancel the other one
    CancelOnSettle(TaskToken),
    /// When this task completes, fail the other one with `reason`
    FailOnComplete { target: TaskToken, reason: String },
}

// ─────────────────────────────────────────────────────────────────────────────
// Task Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to one latent operation
///
/// Constructed by the [`AsyncBridge`](crate::AsyncBridge) and owned by the
/// [`TaskRegistry`](crate::TaskRegistry). The handle leaves `Pending` exactly
/// once; every later `complete`, `fail` or `cancel` is reported as
/// [`Transition::Ignored`].
pub struct TaskHandle {
    token: TaskToken,
    /// Entry point id that started this task
    operation: &'static str,
    /// Context that initiated the task (non-owning)
    owner: ContextId,
    /// Where the graph resumes; `None` for internal tasks
    resume: Option<ResumePoint>,
    link: Option<TaskLink>,
    /// Task state (atomic for lock-free reads)
    state: AtomicU8,
    outcome: Mutex<Option<TaskOutcome>>,
}

impl TaskHandle {
    pub(crate) fn new(
        token: TaskToken,
        operation: &'static str,
        owner: ContextId,
        resume: Option<ResumePoint>,
        link: Option<TaskLink>,
    ) -> Self {
        Self {
            token,
            operation,
            owner,
            resume,
            link,
            state: AtomicU8::new(TaskState::Pending as u8),
            outcome: Mutex::new(None),
        }
    }

    pub fn token(&self) -> TaskToken {
        self.token
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn owner(&self) -> ContextId {
        self.owner
    }

    pub fn resume_point(&self) -> Option<&ResumePoint> {
        self.resume.as_ref()
    }

    pub fn link(&self) -> Option<&TaskLink> {
        self.link.as_ref()
    }

    /// Get the current task state
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check if the task is still waiting on its operation
    pub fn is_pending(&self) -> bool {
        self.state() == TaskState::Pending
    }

    /// The terminal outcome, once there is one
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.outcome.lock().clone()
    }

    /// Finish with a success payload
    pub fn complete(&self, payload: TaskPayload) -> Transition {
        self.finish(TaskOutcome::Completed { payload })
    }

    /// Finish with a failure reason
    pub fn fail(&self, reason: impl Into<String>) -> Transition {
        self.finish(TaskOutcome::Failed {
            reason: reason.into(),
        })
    }

    /// Cancel the task
    pub fn cancel(&self) -> Transition {
        self.finish(TaskOutcome::Cancelled)
    }

    pub(crate) fn finish(&self, outcome: TaskOutcome) -> Transition {
        // The outcome lock orders the state flip with the outcome write, so a
        // reader that sees a terminal state also sees the outcome.
        let mut slot = self.outcome.lock();
        let swapped = self.state.compare_exchange(
            TaskState::Pending as u8,
            outcome.state() as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if swapped.is_err() {
            return Transition::Ignored;
        }
        *slot = Some(outcome);
        Transition::Applied
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("token", &self.token)
            .field("operation", &self.operation)
            .field("owner", &self.owner)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handle() -> TaskHandle {
        TaskHandle::new(
            TaskToken::new(1),
            "latent/Delay",
            ContextId::new(0, 0),
            Some(ResumePoint::new("delay_1")),
            None,
        )
    }

    #[test]
    fn test_first_transition_wins() {
        let h = handle();
        assert!(h.is_pending());

        assert_eq!(h.complete(TaskPayload::Nothing), Transition::Applied);
        assert_eq!(h.fail("late"), Transition::Ignored);
        assert_eq!(h.cancel(), Transition::Ignored);
        assert_eq!(h.complete(TaskPayload::Flag { value: true }), Transition::Ignored);

        assert_eq!(h.state(), TaskState::Completed);
        assert_eq!(
            h.outcome(),
            Some(TaskOutcome::Completed {
                payload: TaskPayload::Nothing
            })
        );
    }

    #[test]
    fn test_cancel_then_complete_is_noop() {
        let h = handle();
        assert!(h.cancel().is_applied());
        assert!(!h.complete(TaskPayload::Nothing).is_applied());
        assert_eq!(h.state(), TaskState::Cancelled);
        assert_eq!(h.outcome(), Some(TaskOutcome::Cancelled));
    }

    #[test]
    fn test_concurrent_signals_apply_once() {
        let h = Arc::new(handle());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let h = Arc::clone(&h);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        h.cancel()
                    } else {
                        h.fail(format!("thread {i}"))
                    }
                })
            })
            .collect();

        let applied = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|t| t.is_applied())
            .count();

        assert_eq!(applied, 1);
        assert!(h.state().is_terminal());
        assert_eq!(h.outcome().map(|o| o.state()), Some(h.state()));
    }
}
