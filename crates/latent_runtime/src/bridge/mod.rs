//! Async Function Bridge
//!
//! Every latent operation follows the same template: validate arguments,
//! register a pending handle, issue the platform request with a callback, and
//! hand the token back without blocking. The callback never resumes the graph
//! itself; it settles the handle and leaves a record for the router.

mod ops;
mod timeout;

pub use ops::*;

use std::sync::{Arc, Weak};

use latent_types::{Concurrency, ContextId, ResumePoint, TaskOutcome, TaskToken};

use crate::context::ContextTable;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{TaskHandle, TaskLink};
use crate::platform::{EnginePlatform, PlatformCallback, PlatformRequest, PlatformResult};
use crate::registry::TaskRegistry;
use crate::router::CompletionRouter;

// ─────────────────────────────────────────────────────────────────────────────
// Completer
// ─────────────────────────────────────────────────────────────────────────────

/// Applies completion signals to handles and forwards them to the router
#[derive(Clone)]
pub(crate) struct Completer {
    registry: Arc<TaskRegistry>,
    router: Arc<CompletionRouter>,
    platform: Arc<dyn EnginePlatform>,
}

impl Completer {
    pub(crate) fn new(
        registry: Arc<TaskRegistry>,
        router: Arc<CompletionRouter>,
        platform: Arc<dyn EnginePlatform>,
    ) -> Self {
        Self {
            registry,
            router,
            platform,
        }
    }

    /// Settle `token` with `outcome`
    ///
    /// Returns false for stale or duplicate signals, which are ignored.
    pub(crate) fn settle(&self, token: TaskToken, outcome: TaskOutcome) -> bool {
        let Some(handle) = self.registry.find(token) else {
            tracing::trace!(token = %token, "Ignoring signal for retired task");
            return false;
        };

        if !handle.finish(outcome.clone()).is_applied() {
            tracing::trace!(token = %token, state = %handle.state(), "Ignoring duplicate signal");
            return false;
        }

        self.router.enqueue(&handle, outcome.clone());
        if let Err(e) = self.registry.retire(token) {
            tracing::error!(token = %token, error = %e, "Failed to retire settled task");
        }

        self.follow_link(&handle, &outcome);
        true
    }

    pub(crate) fn settle_result(&self, token: TaskToken, result: PlatformResult) -> bool {
        let outcome = match result {
            Ok(payload) => TaskOutcome::Completed { payload },
            Err(reason) => TaskOutcome::Failed { reason },
        };
        self.settle(token, outcome)
    }

    /// Cancel a pending task and tell the platform its work can stop
    pub(crate) fn cancel(&self, token: TaskToken) -> bool {
        let cancelled = self.settle(token, TaskOutcome::Cancelled);
        if cancelled {
            self.platform.abandon(token);
        }
        cancelled
    }

    fn follow_link(&self, handle: &TaskHandle, outcome: &TaskOutcome) {
        match handle.link() {
            Some(TaskLink::CancelOnSettle(other)) => {
                self.cancel(*other);
            }
            Some(TaskLink::FailOnComplete { target, reason }) if outcome.is_completed() => {
                if self.settle(
                    *target,
                    TaskOutcome::Failed {
                        reason: reason.clone(),
                    },
                ) {
                    self.platform.abandon(*target);
                }
            }
            _ => {}
        }
    }

    /// Build the platform callback for `token`
    ///
    /// The callback holds the session weakly; once the session is gone it is
    /// a no-op.
    pub(crate) fn callback(&self, token: TaskToken) -> PlatformCallback {
        let registry = Arc::downgrade(&self.registry);
        let router = Arc::downgrade(&self.router);
        let platform: Weak<dyn EnginePlatform> = Arc::downgrade(&self.platform);

        Arc::new(move |result| {
            let (Some(registry), Some(router), Some(platform)) =
                (registry.upgrade(), router.upgrade(), platform.upgrade())
            else {
                tracing::trace!(token = %token, "Ignoring callback after session shutdown");
                return;
            };
            Completer::new(registry, router, platform).settle_result(token, result);
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Latent Request
// ─────────────────────────────────────────────────────────────────────────────

/// Everything needed to start one task
#[derive(Debug, Clone)]
pub struct LatentRequest {
    /// Entry point id, used for logging and single-outstanding bookkeeping
    pub operation: &'static str,
    pub owner: ContextId,
    /// `None` for internal tasks that never resume the graph
    pub resume: Option<ResumePoint>,
    pub concurrency: Concurrency,
    pub request: PlatformRequest,
    /// Pre-allocated token; a fresh one is drawn if unset
    pub token: Option<TaskToken>,
    pub link: Option<TaskLink>,
}

impl LatentRequest {
    pub fn new(
        operation: &'static str,
        owner: ContextId,
        resume: ResumePoint,
        request: PlatformRequest,
    ) -> Self {
        Self {
            operation,
            owner,
            resume: Some(resume),
            concurrency: Concurrency::Concurrent,
            request,
            token: None,
            link: None,
        }
    }

    /// A task that settles silently, without resuming the graph
    pub fn internal(operation: &'static str, owner: ContextId, request: PlatformRequest) -> Self {
        Self {
            resume: None,
            ..Self::new(operation, owner, ResumePoint::new(""), request)
        }
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_token(mut self, token: TaskToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_link(mut self, link: TaskLink) -> Self {
        self.link = Some(link);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Async Bridge
// ─────────────────────────────────────────────────────────────────────────────

/// Entry points that turn graph calls into registered, in-flight tasks
pub struct AsyncBridge {
    registry: Arc<TaskRegistry>,
    contexts: Arc<ContextTable>,
    platform: Arc<dyn EnginePlatform>,
    completer: Completer,
    default_priority: i32,
}

impl AsyncBridge {
    pub fn new(
        registry: Arc<TaskRegistry>,
        router: Arc<CompletionRouter>,
        contexts: Arc<ContextTable>,
        platform: Arc<dyn EnginePlatform>,
    ) -> Self {
        let completer = Completer::new(Arc::clone(&registry), router, Arc::clone(&platform));
        Self {
            registry,
            contexts,
            platform,
            completer,
            default_priority: 0,
        }
    }

    /// Priority used by loads that do not specify one
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn contexts(&self) -> &Arc<ContextTable> {
        &self.contexts
    }

    /// Register a task and issue its platform request
    ///
    /// The handle is visible to `find` before the request is issued, so a
    /// platform that answers inside `start` settles it normally; the result
    /// still waits for the next drain.
    pub fn launch(&self, req: LatentRequest) -> BridgeResult<TaskToken> {
        let LatentRequest {
            operation,
            owner,
            resume,
            concurrency,
            request,
            token,
            link,
        } = req;

        if self.contexts.is_closed() || !self.contexts.is_active(owner) {
            return Err(BridgeError::ContextGone(owner));
        }

        let token = token.unwrap_or_else(|| self.registry.next_token());

        let exclusive = concurrency == Concurrency::SingleOutstanding;
        if exclusive {
            self.registry
                .reserve_exclusive(owner, operation, token)
                .map_err(|existing| BridgeError::AlreadyInProgress {
                    operation: operation.to_string(),
                    context: owner,
                    existing,
                })?;
        }

        let handle = Arc::new(TaskHandle::new(token, operation, owner, resume, link));
        if let Err(e) = self.registry.register(handle) {
            if exclusive {
                self.registry.release_exclusive(owner, operation, token);
            }
            return Err(e.into());
        }

        // Teardown may have started after the first check and missed this
        // handle in its sweep.
        if !self.contexts.is_active(owner) {
            if let Some(handle) = self.registry.find(token) {
                let _ = handle.cancel();
            }
            if let Err(e) = self.registry.retire(token) {
                tracing::error!(token = %token, error = %e, "Failed to retire orphaned task");
            }
            return Err(BridgeError::ContextGone(owner));
        }

        tracing::debug!(
            token = %token,
            operation,
            context = %owner,
            request = request.kind(),
            "Issuing platform request"
        );
        self.platform
            .start(token, request, self.completer.callback(token));

        Ok(token)
    }

    /// Cancel a pending task on behalf of the graph
    ///
    /// The `Cancelled` outcome is routed like any other. Returns false if the
    /// task had already settled.
    pub fn cancel(&self, token: TaskToken) -> bool {
        self.completer.cancel(token)
    }

    /// Whether `token` is still pending
    pub fn is_pending(&self, token: TaskToken) -> bool {
        self.registry.find(token).is_some_and(|h| h.is_pending())
    }
}

impl std::fmt::Debug for AsyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncBridge")
            .field("registry", &self.registry)
            .field("default_priority", &self.default_priority)
            .finish()
    }
}
