//! Built-in Entry Point Registration
//!
//! Registers the latent operations every session exposes to scripted graphs.

use latent_types::{Concurrency, EntryPointDef, PinDef, PinType};

use super::EntryPointRegistry;
use crate::bridge::{DELAY, LOAD_ASSET, LOAD_PACKAGE, WAIT_FOR_EVENT};

/// Register all built-in entry points
pub fn register_builtin_entry_points(registry: &mut EntryPointRegistry) {
    // Timers
    register_latent_entry_points(registry);

    // Asset and package streaming
    register_asset_entry_points(registry);

    // Engine event waits
    register_event_entry_points(registry);

    // Engine internals
    #[cfg(feature = "dangerous")]
    register_dangerous_entry_points(registry);

    tracing::info!("Registered {} built-in entry points", registry.len());
}

// ─────────────────────────────────────────────────────────────────────────────
// Latent Entry Points
// ─────────────────────────────────────────────────────────────────────────────

fn register_latent_entry_points(registry: &mut EntryPointRegistry) {
    registry.register_fn(
        EntryPointDef::latent(DELAY, "Delay", "Latent")
            .with_pin(
                PinDef::data_in_with_default("duration", PinType::Real, serde_json::json!(0.0))
                    .describe("Seconds to wait"),
            )
            .with_pin(PinDef::data_out("waited", PinType::Real))
            .with_description("Resume after a number of seconds"),
        |bridge, call| {
            let seconds = call.require_real("duration")?;
            bridge.delay(call.owner, call.resume.clone(), seconds)
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Asset Entry Points
// ─────────────────────────────────────────────────────────────────────────────

fn register_asset_entry_points(registry: &mut EntryPointRegistry) {
    // Load Asset (priority)
    registry.register_fn(
        EntryPointDef::latent(LOAD_ASSET, "Load Asset (Priority)", "Asset")
            .with_pin(PinDef::data_in("path", PinType::Asset))
            .with_pin(PinDef::data_in("priority", PinType::Integer))
            .with_pin(PinDef::data_out("asset", PinType::Asset))
            .with_pin(PinDef::data_out("reason", PinType::String))
            .with_description("Stream in an asset at the given priority; every call starts a new load"),
        |bridge, call| {
            let path = call.require_string("path")?;
            let priority = call.optional_i32("priority")?;
            bridge.load_asset(call.owner, call.resume.clone(), path, priority)
        },
    );

    // Load Package (priority)
    registry.register_fn(
        EntryPointDef::latent(LOAD_PACKAGE, "Load Package (Priority)", "Asset")
            .with_pin(PinDef::data_in("path", PinType::Asset))
            .with_pin(PinDef::data_in("priority", PinType::Integer))
            .with_pin(
                PinDef::data_in_with_default("block_on_load", PinType::Boolean, serde_json::json!(false))
                    .describe("Flush the load before returning"),
            )
            .with_pin(PinDef::data_out("package", PinType::Asset))
            .with_pin(PinDef::data_out("result", PinType::String))
            .with_description("Load a package; the engine's loading result is reported on completion"),
        |bridge, call| {
            let path = call.require_string("path")?;
            let priority = call.optional_i32("priority")?;
            let block = call.optional_bool("block_on_load")?.unwrap_or(false);
            bridge.load_package(call.owner, call.resume.clone(), path, priority, block)
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Entry Points
// ─────────────────────────────────────────────────────────────────────────────

fn register_event_entry_points(registry: &mut EntryPointRegistry) {
    registry.register_fn(
        EntryPointDef::latent(WAIT_FOR_EVENT, "Wait For Event", "Event")
            .with_concurrency(Concurrency::SingleOutstanding)
            .with_pin(
                PinDef::data_in("pattern", PinType::String)
                    .describe("Event type, with * wildcards"),
            )
            .with_pin(PinDef::data_in("timeout", PinType::Real).describe("Optional, in seconds"))
            .with_pin(PinDef::data_out("event", PinType::Event))
            .with_pin(PinDef::data_out("reason", PinType::String))
            .with_description("Resume when a matching engine event is raised"),
        |bridge, call| {
            let pattern = call.require_string("pattern")?;
            let timeout = call.optional_real("timeout")?;
            bridge.wait_for_event(call.owner, call.resume.clone(), pattern, timeout)
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Dangerous Entry Points
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "dangerous")]
fn register_dangerous_entry_points(registry: &mut EntryPointRegistry) {
    use crate::bridge::SET_PROPERTY_VALUE;

    registry.register_fn(
        EntryPointDef::latent(SET_PROPERTY_VALUE, "Set Object Property Value", "Object")
            .dangerous()
            .with_pin(PinDef::data_in("property", PinType::String))
            .with_pin(PinDef::data_in_with_default("value", PinType::String, serde_json::json!("")))
            .with_pin(PinDef::data_out("success", PinType::Boolean))
            .with_description("Write a property on the calling object by name"),
        |bridge, call| {
            let property = call.require_string("property")?;
            let value = call.require_string("value")?;
            bridge.set_property_value(call.owner, call.resume.clone(), property, value)
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = EntryPointRegistry::with_builtins();

        assert!(registry.contains(DELAY));
        assert!(registry.contains(LOAD_ASSET));
        assert!(registry.contains(LOAD_PACKAGE));
        assert!(registry.contains(WAIT_FOR_EVENT));
        assert_eq!(
            registry.get_definition(WAIT_FOR_EVENT).map(|d| d.concurrency),
            Some(Concurrency::SingleOutstanding)
        );
        assert!(registry.definitions().all(|d| d.latent));
    }

    #[cfg(feature = "dangerous")]
    #[test]
    fn test_dangerous_builtins_can_be_disabled() {
        let mut registry = EntryPointRegistry::with_builtins();
        assert!(registry.contains(crate::bridge::SET_PROPERTY_VALUE));
        assert_eq!(registry.in_category("Object").len(), 1);

        assert_eq!(registry.disable_dangerous(), 1);
        assert!(!registry.contains(crate::bridge::SET_PROPERTY_VALUE));
        assert!(registry.in_category("Object").is_empty());
    }
}
