// Demo Scenario - A scripted graph exercising every built-in entry point
//
// Three contexts start a mix of timers, loads and event waits. One task is
// cancelled by the graph, one context is destroyed mid-flight, and an engine
// event arrives from another task while the tick loop runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde_json::{Value, json};
use tracing::{info, warn};

use latent_runtime::platform::TokioPlatform;
use latent_runtime::{DELAY, LOAD_ASSET, LOAD_PACKAGE, Session, WAIT_FOR_EVENT};
use latent_types::{ContextId, EngineEvent, Resumption, TaskToken};

use crate::config::LoopConfig;

/// Paths the demo platform can load
pub const MOUNTED_ASSETS: &[&str] = &["/Game/Characters/Hero", "/Game/Maps/Arena"];

const CANCEL_AT_TICK: u64 = 2;
const DESTROY_AT_TICK: u64 = 5;

fn call(session: &Session, entry: &str, owner: ContextId, node: &str, inputs: Value) -> Option<TaskToken> {
    let inputs = match inputs {
        Value::Object(map) => map.into_iter().collect(),
        _ => Default::default(),
    };
    match session.call(entry, owner, node, inputs) {
        Ok(token) => {
            info!(entry, node, token = %token, "Graph called entry point");
            Some(token)
        }
        Err(e) => {
            warn!(entry, node, error = %e, "Entry point rejected call");
            None
        }
    }
}

fn log_resumption(resumption: Resumption) {
    let outputs = Value::Object(resumption.output_values());
    info!(
        token = %resumption.token,
        context = %resumption.owner,
        node = %resumption.resume.node_id,
        pin = resumption.exec_pin(),
        outputs = %outputs,
        "Graph resumed"
    );
}

pub async fn run(session: &Session, platform: &Arc<TokioPlatform>, host: &LoopConfig) -> Result<()> {
    let hero = session.spawn_context("hero")?;
    let door = session.spawn_context("door")?;
    let listener = session.spawn_context("listener")?;

    call(session, DELAY, hero, "hero_delay", json!({"duration": 0.1}));
    call(session, LOAD_ASSET, hero, "load_hero", json!({"path": "/Game/Characters/Hero", "priority": 5}));
    call(session, LOAD_ASSET, hero, "load_villain", json!({"path": "/Game/Characters/Villain"}));
    call(session, WAIT_FOR_EVENT, hero, "hero_wait", json!({"pattern": "Never/*", "timeout": 0.3}));
    let long_delay = call(session, DELAY, hero, "hero_long_delay", json!({"duration": 10.0}));

    // Flushed load: settled before the call returns, resumed on the next tick.
    call(session, LOAD_PACKAGE, door, "load_arena", json!({"path": "/Game/Maps/Arena", "block_on_load": true}));
    call(session, WAIT_FOR_EVENT, door, "door_wait", json!({"pattern": "Voice/*"}));
    #[cfg(feature = "dangerous")]
    call(
        session,
        latent_runtime::SET_PROPERTY_VALUE,
        door,
        "open_door",
        json!({"property": "bOpen", "value": "true"}),
    );

    call(session, WAIT_FOR_EVENT, listener, "device_wait", json!({"pattern": "Device/*", "timeout": 2.0}));
    // Only one event wait per context; this one is rejected.
    call(session, WAIT_FOR_EVENT, listener, "device_wait_again", json!({"pattern": "Device/*"}));

    let emitter = {
        let platform = Arc::clone(platform);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let event = EngineEvent::new("Device/Connected", "input", json!({"device": "gamepad", "index": 0}));
            platform.emit(event)
        })
    };

    let mut resumer = log_resumption;
    let mut interval = tokio::time::interval(Duration::from_millis(host.tick_interval_ms.max(1)));
    for tick in 1..=host.max_ticks {
        interval.tick().await;
        let delivered = session.tick(&mut resumer);
        if delivered > 0 {
            info!(tick, delivered, pending = session.pending_count(), "Tick");
        }

        if tick == CANCEL_AT_TICK {
            if let Some(token) = long_delay {
                session.cancel(token);
            }
        }
        if tick == DESTROY_AT_TICK {
            let name = session.context_name(door).unwrap_or_default();
            let cancelled = session.destroy_context(door);
            info!(tick, context = %door, name = %name, cancelled = ?cancelled, "Destroyed context");
        }

        if tick > DESTROY_AT_TICK && session.pending_count() == 0 && session.queued_count() == 0 {
            info!(tick, "Scenario settled");
            break;
        }
    }

    match emitter.await {
        Ok(woken) => info!(woken, "Event emitter finished"),
        Err(e) => warn!(error = %e, "Event emitter failed"),
    }

    let report = session.shutdown();
    info!(
        cancelled = report.cancelled,
        discarded = report.discarded,
        leaked = report.leaked,
        "Session report"
    );
    ensure!(report.leaked == 0, "{} tasks leaked past shutdown", report.leaked);
    Ok(())
}
