// Manual Platform - Deterministic, test-driven engine platform
//
// Records every issued request and leaves completion to the caller, which may
// fire callbacks from any thread, fire them twice, or never fire them.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use latent_types::{ContextId, TaskToken};

use super::{EnginePlatform, PlatformCallback, PlatformRequest, PlatformResult};

type InlineResponder = Box<dyn Fn(&PlatformRequest) -> Option<PlatformResult> + Send + Sync>;

/// A request the bridge issued to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedRequest {
    pub token: TaskToken,
    pub request: PlatformRequest,
}

/// Engine platform driven by hand
///
/// Callbacks are retained after they fire, so `complete` can replay a
/// duplicate or late completion for any token ever issued.
#[derive(Default)]
pub struct ManualPlatform {
    issued: Mutex<Vec<(IssuedRequest, PlatformCallback)>>,
    abandoned: Mutex<HashSet<TaskToken>>,
    released: Mutex<HashSet<ContextId>>,
    inline: Mutex<Option<InlineResponder>>,
}

impl ManualPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer matching requests synchronously, inside `start`
    ///
    /// The responder returns `None` to leave a request pending.
    pub fn respond_inline<F>(&self, responder: F)
    where
        F: Fn(&PlatformRequest) -> Option<PlatformResult> + Send + Sync + 'static,
    {
        *self.inline.lock() = Some(Box::new(responder));
    }

    /// Invoke the callback for `token`
    ///
    /// Returns false if the token was never issued.
    pub fn complete(&self, token: TaskToken, result: PlatformResult) -> bool {
        // Clone out so the callback runs without the platform lock held.
        let callback = self
            .issued
            .lock()
            .iter()
            .find(|(req, _)| req.token == token)
            .map(|(_, cb)| Arc::clone(cb));

        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    /// Fail the request for `token`
    pub fn fail(&self, token: TaskToken, reason: impl Into<String>) -> bool {
        self.complete(token, Err(reason.into()))
    }

    /// Every request issued so far, in issue order
    pub fn requests(&self) -> Vec<IssuedRequest> {
        self.issued.lock().iter().map(|(req, _)| req.clone()).collect()
    }

    /// The request issued for `token`
    pub fn request_for(&self, token: TaskToken) -> Option<PlatformRequest> {
        self.issued
            .lock()
            .iter()
            .find(|(req, _)| req.token == token)
            .map(|(req, _)| req.request.clone())
    }

    pub fn issued_count(&self) -> usize {
        self.issued.lock().len()
    }

    /// Whether the bridge abandoned `token`
    pub fn was_abandoned(&self, token: TaskToken) -> bool {
        self.abandoned.lock().contains(&token)
    }

    /// Whether teardown released `owner`
    pub fn was_released(&self, owner: ContextId) -> bool {
        self.released.lock().contains(&owner)
    }
}

impl EnginePlatform for ManualPlatform {
    fn start(&self, token: TaskToken, request: PlatformRequest, on_done: PlatformCallback) {
        let inline = self.inline.lock().as_ref().and_then(|respond| respond(&request));

        self.issued.lock().push((
            IssuedRequest {
                token,
                request,
            },
            Arc::clone(&on_done),
        ));

        if let Some(result) = inline {
            on_done(result);
        }
    }

    fn abandon(&self, token: TaskToken) {
        self.abandoned.lock().insert(token);
    }

    fn release_context(&self, owner: ContextId) {
        self.released.lock().insert(owner);
    }
}

impl std::fmt::Debug for ManualPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualPlatform")
            .field("issued", &self.issued_count())
            .field("abandoned", &self.abandoned.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latent_types::TaskPayload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> PlatformCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_complete_replays_callback() {
        let platform = ManualPlatform::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let token = TaskToken::new(1);

        platform.start(
            token,
            PlatformRequest::Delay {
                duration: Duration::from_secs(1),
            },
            counting_callback(&calls),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(platform.complete(token, Ok(TaskPayload::Nothing)));
        assert!(platform.complete(token, Ok(TaskPayload::Nothing)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!platform.complete(TaskToken::new(99), Ok(TaskPayload::Nothing)));
    }

    #[test]
    fn test_inline_response() {
        let platform = ManualPlatform::new();
        platform.respond_inline(|req| match req {
            PlatformRequest::LoadAsset { path, .. } => {
                Some(Ok(TaskPayload::Asset { path: path.clone() }))
            }
            _ => None,
        });

        let calls = Arc::new(AtomicUsize::new(0));
        platform.start(
            TaskToken::new(1),
            PlatformRequest::LoadAsset {
                path: "/Game/Hero".into(),
                priority: 0,
            },
            counting_callback(&calls),
        );
        platform.start(
            TaskToken::new(2),
            PlatformRequest::Delay {
                duration: Duration::ZERO,
            },
            counting_callback(&calls),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(platform.issued_count(), 2);
    }

    #[test]
    fn test_abandon_is_recorded() {
        let platform = ManualPlatform::new();
        platform.abandon(TaskToken::new(3));
        assert!(platform.was_abandoned(TaskToken::new(3)));
        assert!(!platform.was_abandoned(TaskToken::new(4)));
    }
}
