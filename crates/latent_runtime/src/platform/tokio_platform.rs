// Tokio Platform - Engine platform backed by a tokio runtime
//
// Timers and streamed asset loads run as spawned tasks and call back from
// runtime worker threads. Event waits are parked until `emit` raises a
// matching event. Blocking package loads and property writes answer inline.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use latent_types::{AsyncLoadingResult, ContextId, EngineEvent, TaskPayload, TaskToken};

use super::{EnginePlatform, PlatformCallback, PlatformRequest};

struct Waiter {
    token: TaskToken,
    owner: ContextId,
    pattern: String,
    on_done: PlatformCallback,
}

/// Engine platform running on a tokio runtime
pub struct TokioPlatform {
    runtime: Handle,
    asset_latency: Duration,
    /// Known asset and package paths; empty means every path resolves
    mounted: HashSet<String>,
    in_flight: DashMap<TaskToken, JoinHandle<()>>,
    waiters: Mutex<Vec<Waiter>>,
    properties: DashMap<(ContextId, String), String>,
}

impl TokioPlatform {
    /// Create a platform spawning onto `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            asset_latency: Duration::from_millis(50),
            mounted: HashSet::new(),
            in_flight: DashMap::new(),
            waiters: Mutex::new(Vec::new()),
            properties: DashMap::new(),
        }
    }

    /// Create a platform on the runtime of the calling thread
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    /// Simulated time to stream in an asset
    pub fn with_asset_latency(mut self, latency: Duration) -> Self {
        self.asset_latency = latency;
        self
    }

    /// Restrict loads to the given paths
    pub fn with_mounted<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mounted.extend(paths.into_iter().map(Into::into));
        self
    }

    fn is_mounted(&self, path: &str) -> bool {
        self.mounted.is_empty() || self.mounted.contains(path)
    }

    /// Raise an engine event, completing every matching wait
    ///
    /// Returns the number of waits completed.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let matched: Vec<Waiter> = {
            let mut waiters = self.waiters.lock();
            let (matched, rest): (Vec<Waiter>, Vec<Waiter>) = waiters
                .drain(..)
                .partition(|w| event.matches(&w.pattern));
            *waiters = rest;
            matched
        };

        tracing::debug!(
            event_type = %event.event_type,
            source = %event.source,
            waiters = matched.len(),
            "Engine event raised"
        );

        let count = matched.len();
        for waiter in matched {
            (waiter.on_done)(Ok(TaskPayload::Event(event.clone())));
        }
        count
    }

    /// Number of event waits currently parked
    pub fn waiting_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Number of event waits parked for `owner`
    pub fn waiting_for(&self, owner: ContextId) -> usize {
        self.waiters.lock().iter().filter(|w| w.owner == owner).count()
    }

    /// Last value written to `property` on `owner`
    pub fn property(&self, owner: ContextId, property: &str) -> Option<String> {
        self.properties
            .get(&(owner, property.to_string()))
            .map(|v| v.value().clone())
    }

    fn spawn_tracked<F>(&self, token: TaskToken, work: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.in_flight.retain(|_, task| !task.is_finished());
        let task = self.runtime.spawn(work);
        self.in_flight.insert(token, task);
    }

    fn load_package(&self, path: &str, block_on_load: bool) -> TaskPayload {
        let result = if self.is_mounted(path) {
            AsyncLoadingResult::Succeeded
        } else {
            AsyncLoadingResult::Failed
        };
        tracing::debug!(path, block_on_load, result = ?result, "Package load finished");
        TaskPayload::Package {
            path: path.to_string(),
            result,
        }
    }
}

impl EnginePlatform for TokioPlatform {
    fn start(&self, token: TaskToken, request: PlatformRequest, on_done: PlatformCallback) {
        match request {
            PlatformRequest::Delay { duration } => {
                self.spawn_tracked(token, async move {
                    let started = Instant::now();
                    tokio::time::sleep(duration).await;
                    on_done(Ok(TaskPayload::Elapsed {
                        waited: started.elapsed(),
                    }));
                });
            }

            PlatformRequest::LoadAsset { path, priority } => {
                let found = self.is_mounted(&path);
                let latency = self.asset_latency;
                tracing::trace!(token = %token, path = %path, priority, "Streaming asset");
                self.spawn_tracked(token, async move {
                    tokio::time::sleep(latency).await;
                    if found {
                        on_done(Ok(TaskPayload::Asset { path }));
                    } else {
                        on_done(Err(format!("asset not found: {path}")));
                    }
                });
            }

            PlatformRequest::LoadPackage {
                path,
                priority,
                block_on_load,
            } => {
                tracing::trace!(token = %token, path = %path, priority, "Loading package");
                if block_on_load {
                    // Flushed: the result is known before `start` returns.
                    on_done(Ok(self.load_package(&path, true)));
                } else {
                    let payload = self.load_package(&path, false);
                    let latency = self.asset_latency;
                    self.spawn_tracked(token, async move {
                        tokio::time::sleep(latency).await;
                        on_done(Ok(payload));
                    });
                }
            }

            PlatformRequest::WaitForEvent { owner, pattern } => {
                self.waiters.lock().push(Waiter {
                    token,
                    owner,
                    pattern,
                    on_done,
                });
            }

            PlatformRequest::SetPropertyValue {
                owner,
                property,
                value,
            } => {
                self.properties.insert((owner, property), value);
                on_done(Ok(TaskPayload::Flag { value: true }));
            }
        }
    }

    fn abandon(&self, token: TaskToken) {
        if let Some((_, task)) = self.in_flight.remove(&token) {
            task.abort();
        }
        self.waiters.lock().retain(|w| w.token != token);
    }

    fn release_context(&self, owner: ContextId) {
        self.properties.retain(|(o, _), _| *o != owner);
        self.waiters.lock().retain(|w| w.owner != owner);
    }
}

impl std::fmt::Debug for TokioPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioPlatform")
            .field("asset_latency", &self.asset_latency)
            .field("in_flight", &self.in_flight.len())
            .field("waiting", &self.waiting_count())
            .finish()
    }
}
