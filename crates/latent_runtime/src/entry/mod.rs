// Entry Point Registry - The named call surface scripted graphs invoke
//
// Each entry point pairs a definition (pins, category, concurrency) with an
// implementation that turns a call into a task through the bridge.

mod builtin;
mod call;

pub use builtin::register_builtin_entry_points;
pub use call::CallContext;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use latent_types::{ContextId, EntryPointDef, ResumePoint, TaskToken};

use crate::bridge::AsyncBridge;
use crate::error::{BridgeError, BridgeResult};

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Implementation behind an entry point
pub trait EntryPoint: Send + Sync {
    /// Start the operation, returning its token without blocking
    fn invoke(&self, bridge: &AsyncBridge, call: &CallContext) -> BridgeResult<TaskToken>;
}

/// Function-based entry point
pub struct FnEntryPoint<F>
where
    F: Fn(&AsyncBridge, &CallContext) -> BridgeResult<TaskToken> + Send + Sync,
{
    func: F,
}

impl<F> FnEntryPoint<F>
where
    F: Fn(&AsyncBridge, &CallContext) -> BridgeResult<TaskToken> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> EntryPoint for FnEntryPoint<F>
where
    F: Fn(&AsyncBridge, &CallContext) -> BridgeResult<TaskToken> + Send + Sync,
{
    fn invoke(&self, bridge: &AsyncBridge, call: &CallContext) -> BridgeResult<TaskToken> {
        (self.func)(bridge, call)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point Registry
// ─────────────────────────────────────────────────────────────────────────────

struct Entry {
    definition: EntryPointDef,
    implementation: Arc<dyn EntryPoint>,
}

/// Registry of all callable entry points
pub struct EntryPointRegistry {
    entries: HashMap<String, Entry>,
}

impl Default for EntryPointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryPointRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in entry point
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_entry_points(&mut registry);
        registry
    }

    /// Register an entry point with its implementation
    pub fn register(&mut self, definition: EntryPointDef, implementation: Arc<dyn EntryPoint>) {
        let id = definition.id.clone();
        self.entries.insert(
            id,
            Entry {
                definition,
                implementation,
            },
        );
    }

    /// Register an entry point backed by a function
    pub fn register_fn<F>(&mut self, definition: EntryPointDef, func: F)
    where
        F: Fn(&AsyncBridge, &CallContext) -> BridgeResult<TaskToken> + Send + Sync + 'static,
    {
        self.register(definition, Arc::new(FnEntryPoint::new(func)));
    }

    /// Remove every entry point marked dangerous, returning how many were removed
    pub fn disable_dangerous(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.definition.dangerous);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::info!(removed, "Dangerous entry points disabled");
        }
        removed
    }

    /// Get a definition by id
    pub fn get_definition(&self, id: &str) -> Option<&EntryPointDef> {
        self.entries.get(id).map(|e| &e.definition)
    }

    /// Get all registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.entries.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Get all definitions
    pub fn definitions(&self) -> impl Iterator<Item = &EntryPointDef> {
        self.entries.values().map(|e| &e.definition)
    }

    /// Get entry points by category
    pub fn in_category(&self, category: &str) -> Vec<&EntryPointDef> {
        self.entries
            .values()
            .filter(|e| e.definition.category == category)
            .map(|e| &e.definition)
            .collect()
    }

    /// Get all categories
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<_> = self
            .entries
            .values()
            .map(|e| e.definition.category.clone())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }

    /// Check if an entry point is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call an entry point from a graph node
    ///
    /// Missing inputs fall back to the pin defaults; the graph resumes at
    /// `node_id` through the definition's result pins.
    pub fn invoke(
        &self,
        bridge: &AsyncBridge,
        id: &str,
        owner: ContextId,
        node_id: &str,
        mut inputs: HashMap<String, Value>,
    ) -> BridgeResult<TaskToken> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| BridgeError::UnknownEntryPoint(id.to_string()))?;

        for pin in entry.definition.data_inputs() {
            if let Some(default) = &pin.default {
                inputs
                    .entry(pin.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        let call = CallContext::new(node_id, owner, inputs).with_resume(ResumePoint::with_pins(
            node_id,
            entry.definition.result_pins.clone(),
        ));

        entry.implementation.invoke(bridge, &call)
    }
}

impl std::fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPointRegistry")
            .field("entries", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextTable;
    use crate::platform::{ManualPlatform, PlatformRequest};
    use crate::registry::TaskRegistry;
    use crate::router::CompletionRouter;
    use latent_types::{PinDef, PinType};
    use std::time::Duration;

    fn bridge() -> (Arc<ManualPlatform>, AsyncBridge, ContextId) {
        let platform = ManualPlatform::new();
        let contexts = Arc::new(ContextTable::new());
        let ctx = contexts.spawn("player").unwrap();
        let router = Arc::new(CompletionRouter::new(Arc::clone(&contexts)));
        let bridge = AsyncBridge::new(
            Arc::new(TaskRegistry::new()),
            router,
            contexts,
            platform.clone(),
        );
        (platform, bridge, ctx)
    }

    #[test]
    fn test_empty_registry() {
        let registry = EntryPointRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_fn_and_defaults() {
        let (platform, bridge, ctx) = bridge();
        let mut registry = EntryPointRegistry::new();

        let def = EntryPointDef::latent("test/Wait", "Wait", "Test").with_pin(
            PinDef::data_in_with_default("seconds", PinType::Real, serde_json::json!(0.25)),
        );
        registry.register_fn(def, |bridge, call| {
            let seconds = call.require_real("seconds")?;
            bridge.delay(call.owner, call.resume.clone(), seconds)
        });

        assert!(registry.contains("test/Wait"));
        assert_eq!(registry.categories(), vec!["Test".to_string()]);

        let token = registry
            .invoke(&bridge, "test/Wait", ctx, "wait_1", HashMap::new())
            .unwrap();
        assert_eq!(
            platform.request_for(token),
            Some(PlatformRequest::Delay {
                duration: Duration::from_millis(250)
            })
        );
    }

    #[test]
    fn test_unknown_entry_point() {
        let (_platform, bridge, ctx) = bridge();
        let registry = EntryPointRegistry::new();
        assert_eq!(
            registry.invoke(&bridge, "nope/Nothing", ctx, "n", HashMap::new()),
            Err(BridgeError::UnknownEntryPoint("nope/Nothing".into()))
        );
    }

    #[test]
    fn test_disable_dangerous() {
        let mut registry = EntryPointRegistry::new();
        registry.register_fn(
            EntryPointDef::latent("test/Safe", "Safe", "Test"),
            |_, _| Err(BridgeError::invalid("unused")),
        );
        registry.register_fn(
            EntryPointDef::latent("test/Risky", "Risky", "Test").dangerous(),
            |_, _| Err(BridgeError::invalid("unused")),
        );

        assert_eq!(registry.disable_dangerous(), 1);
        assert_eq!(registry.ids(), vec!["test/Safe"]);
    }
}
