//! Session
//!
//! The world-scoped owner of the registry, router, context table, bridge and
//! entry points. Sessions share nothing; several may run side by side.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use uuid::Uuid;

use latent_types::{ContextId, ContextPhase, ResumePoint, TaskToken};

use crate::bridge::AsyncBridge;
use crate::config::SessionConfig;
use crate::context::ContextTable;
use crate::entry::EntryPointRegistry;
use crate::error::{BridgeError, BridgeResult};
use crate::platform::EnginePlatform;
use crate::registry::TaskRegistry;
use crate::router::{CompletionRouter, GraphResumer};
use crate::teardown::TeardownMonitor;

/// What `Session::shutdown` cleaned up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Pending tasks cancelled
    pub cancelled: usize,
    /// Queued resumptions discarded undelivered
    pub discarded: usize,
    /// Tasks still registered afterwards; nonzero is a bug
    pub leaked: usize,
}

/// A world/session hosting latent tasks for its contexts
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    contexts: Arc<ContextTable>,
    registry: Arc<TaskRegistry>,
    router: Arc<CompletionRouter>,
    platform: Arc<dyn EnginePlatform>,
    monitor: TeardownMonitor,
    bridge: AsyncBridge,
    entries: EntryPointRegistry,
    shut_down: AtomicBool,
}

impl Session {
    /// Create a session issuing requests to `platform`
    pub fn new(config: SessionConfig, platform: Arc<dyn EnginePlatform>) -> Self {
        let id = Uuid::new_v4();
        let contexts = Arc::new(ContextTable::new());
        let registry = Arc::new(TaskRegistry::new());
        let router = Arc::new(CompletionRouter::new(Arc::clone(&contexts)));
        let monitor = TeardownMonitor::new(
            Arc::clone(&contexts),
            Arc::clone(&registry),
            Arc::clone(&platform),
        );
        let bridge = AsyncBridge::new(
            Arc::clone(&registry),
            Arc::clone(&router),
            Arc::clone(&contexts),
            Arc::clone(&platform),
        )
        .with_default_priority(config.default_load_priority);

        let mut entries = EntryPointRegistry::with_builtins();
        if !config.dangerous_functions {
            entries.disable_dangerous();
        }

        tracing::info!(
            session = %id,
            name = %config.name,
            entry_points = entries.len(),
            "Session started"
        );

        Self {
            id,
            config,
            contexts,
            registry,
            router,
            platform,
            monitor,
            bridge,
            entries,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn bridge(&self) -> &AsyncBridge {
        &self.bridge
    }

    pub fn entries(&self) -> &EntryPointRegistry {
        &self.entries
    }

    /// Mutable access for registering additional entry points
    pub fn entries_mut(&mut self) -> &mut EntryPointRegistry {
        &mut self.entries
    }

    pub fn platform(&self) -> &Arc<dyn EnginePlatform> {
        &self.platform
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Contexts
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a context (object or world) that can own tasks
    ///
    /// Fails with `SessionClosed` after `shutdown`.
    pub fn spawn_context(&self, name: impl Into<String>) -> BridgeResult<ContextId> {
        let name = name.into();
        let Some(id) = self.contexts.spawn(name.as_str()) else {
            tracing::warn!(session = %self.id, name = %name, "Refusing context after shutdown");
            return Err(BridgeError::SessionClosed);
        };
        tracing::debug!(session = %self.id, context = %id, name = %name, "Context spawned");
        Ok(id)
    }

    /// Destroy a context, cancelling every task it owns
    ///
    /// Returns the number of tasks cancelled, or `None` if the context was
    /// not active.
    pub fn destroy_context(&self, id: ContextId) -> Option<usize> {
        self.monitor.destroy(id)
    }

    pub fn context_phase(&self, id: ContextId) -> ContextPhase {
        self.contexts.phase(id)
    }

    pub fn context_name(&self, id: ContextId) -> Option<String> {
        self.contexts.name(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Invoke an entry point by id from a graph node
    pub fn call(
        &self,
        entry_id: &str,
        owner: ContextId,
        node_id: &str,
        inputs: HashMap<String, Value>,
    ) -> BridgeResult<TaskToken> {
        self.entries
            .invoke(&self.bridge, entry_id, owner, node_id, inputs)
    }

    pub fn delay(&self, owner: ContextId, node_id: &str, seconds: f64) -> BridgeResult<TaskToken> {
        self.bridge.delay(owner, ResumePoint::new(node_id), seconds)
    }

    pub fn load_asset(
        &self,
        owner: ContextId,
        node_id: &str,
        path: &str,
        priority: Option<i32>,
    ) -> BridgeResult<TaskToken> {
        self.bridge
            .load_asset(owner, ResumePoint::new(node_id), path, priority)
    }

    pub fn load_package(
        &self,
        owner: ContextId,
        node_id: &str,
        path: &str,
        priority: Option<i32>,
        block_on_load: bool,
    ) -> BridgeResult<TaskToken> {
        self.bridge.load_package(
            owner,
            ResumePoint::new(node_id),
            path,
            priority,
            block_on_load,
        )
    }

    pub fn wait_for_event(
        &self,
        owner: ContextId,
        node_id: &str,
        pattern: &str,
        timeout: Option<f64>,
    ) -> BridgeResult<TaskToken> {
        self.bridge
            .wait_for_event(owner, ResumePoint::new(node_id), pattern, timeout)
    }

    /// Write a property on the context's object
    ///
    /// Fails with `UnknownEntryPoint` when dangerous functions are switched
    /// off for this session.
    #[cfg(feature = "dangerous")]
    pub fn set_property_value(
        &self,
        owner: ContextId,
        node_id: &str,
        property: &str,
        value: &str,
    ) -> BridgeResult<TaskToken> {
        if !self.config.dangerous_functions {
            return Err(BridgeError::UnknownEntryPoint(
                crate::bridge::SET_PROPERTY_VALUE.to_string(),
            ));
        }
        self.bridge
            .set_property_value(owner, ResumePoint::new(node_id), property, value)
    }

    /// Cancel a pending task; the graph sees its `cancelled` pin fire
    pub fn cancel(&self, token: TaskToken) -> bool {
        self.bridge.cancel(token)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tick
    // ─────────────────────────────────────────────────────────────────────────

    /// Drain point: deliver queued resumptions to the graph
    pub fn tick(&self, resumer: &mut dyn GraphResumer) -> usize {
        if self.shut_down.load(Ordering::Acquire) {
            return 0;
        }
        self.router.drain(resumer, self.config.max_drain_per_tick)
    }

    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    /// Resumptions waiting for the next tick
    pub fn queued_count(&self) -> usize {
        self.router.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Cancel every task, discard undelivered resumptions and destroy every
    /// context
    ///
    /// Runs once; later calls return an empty report.
    pub fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }

        // Closed first so nothing spawned mid-teardown escapes the sweep.
        self.contexts.close();
        let mut cancelled = self.monitor.teardown_all();
        for handle in self.registry.cancel_all() {
            self.platform.abandon(handle.token());
            cancelled += 1;
        }
        let discarded = self.router.clear();
        let leaked = self.registry.len();

        if leaked > 0 {
            tracing::error!(session = %self.id, leaked, "Tasks leaked past session shutdown");
        }

        let report = ShutdownReport {
            cancelled,
            discarded,
            leaked,
        };
        tracing::info!(
            session = %self.id,
            name = %self.config.name,
            cancelled,
            discarded,
            retired = self.registry.retired_count(),
            "Session shut down"
        );
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("registry", &self.registry)
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualPlatform;
    use latent_types::{Resumption, TaskPayload};

    fn session(config: SessionConfig) -> (Arc<ManualPlatform>, Session) {
        let platform = ManualPlatform::new();
        let session = Session::new(config, platform.clone());
        (platform, session)
    }

    #[test]
    fn test_tick_respects_drain_cap() {
        let (platform, session) = session(SessionConfig {
            max_drain_per_tick: Some(1),
            ..SessionConfig::default()
        });
        let ctx = session.spawn_context("player").unwrap();

        let a = session.delay(ctx, "a", 1.0).unwrap();
        let b = session.delay(ctx, "b", 1.0).unwrap();
        platform.complete(a, Ok(TaskPayload::Nothing));
        platform.complete(b, Ok(TaskPayload::Nothing));

        let mut seen: Vec<Resumption> = Vec::new();
        assert_eq!(session.tick(&mut seen), 1);
        assert_eq!(session.queued_count(), 1);
        assert_eq!(session.tick(&mut seen), 1);
        assert_eq!(seen[1].token, b);
    }

    #[test]
    fn test_shutdown_report() {
        let (platform, session) = session(SessionConfig::default());
        let ctx = session.spawn_context("player").unwrap();

        let done = session.delay(ctx, "done", 1.0).unwrap();
        session.delay(ctx, "waiting", 1.0).unwrap();
        platform.complete(done, Ok(TaskPayload::Nothing));

        let report = session.shutdown();
        assert_eq!(
            report,
            ShutdownReport {
                cancelled: 1,
                discarded: 1,
                leaked: 0,
            }
        );
        assert_eq!(session.shutdown(), ShutdownReport::default());
        assert_eq!(session.context_phase(ctx), ContextPhase::Gone);

        let mut seen: Vec<Resumption> = Vec::new();
        assert_eq!(session.tick(&mut seen), 0);
    }

    #[test]
    fn test_no_contexts_after_shutdown() {
        let (platform, session) = session(SessionConfig::default());
        let ctx = session.spawn_context("player").unwrap();
        session.shutdown();

        assert_eq!(
            session.spawn_context("late").unwrap_err(),
            BridgeError::SessionClosed
        );
        assert_eq!(
            session.delay(ctx, "late_delay", 1.0).unwrap_err(),
            BridgeError::ContextGone(ctx)
        );
        assert_eq!(session.pending_count(), 0);
        assert_eq!(platform.issued_count(), 0);
    }

    #[test]
    fn test_call_by_entry_id() {
        let (platform, session) = session(SessionConfig::default());
        let ctx = session.spawn_context("player").unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("path".to_string(), serde_json::json!("/Game/Hero"));
        let token = session
            .call(crate::bridge::LOAD_ASSET, ctx, "load_1", inputs)
            .unwrap();

        assert_eq!(
            platform.request_for(token),
            Some(crate::platform::PlatformRequest::LoadAsset {
                path: "/Game/Hero".into(),
                priority: 0,
            })
        );
    }

    #[test]
    fn test_custom_entry_point() {
        let (platform, mut session) = session(SessionConfig::default());
        session.entries_mut().register_fn(
            latent_types::EntryPointDef::latent("game/Respawn", "Respawn", "Game"),
            |bridge, call| bridge.delay(call.owner, call.resume.clone(), 3.0),
        );
        let ctx = session.spawn_context("player").unwrap();
        assert_eq!(session.context_name(ctx).as_deref(), Some("player"));

        let token = session
            .call("game/Respawn", ctx, "respawn", HashMap::new())
            .unwrap();
        assert!(matches!(
            platform.request_for(token),
            Some(crate::platform::PlatformRequest::Delay { .. })
        ));
    }

    #[test]
    fn test_default_priority_from_config() {
        let (platform, session) = session(SessionConfig {
            default_load_priority: 7,
            ..SessionConfig::default()
        });
        let ctx = session.spawn_context("player").unwrap();

        let token = session.load_asset(ctx, "load", "/Game/Hero", None).unwrap();
        assert!(matches!(
            platform.request_for(token),
            Some(crate::platform::PlatformRequest::LoadAsset { priority: 7, .. })
        ));
    }
}
