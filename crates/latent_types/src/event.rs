//! Engine Events
//!
//! Events raised by the engine or platform (device input, subsystem
//! notifications) that latent event waits can be resumed by.

use serde::{Deserialize, Serialize};
use wildmatch::WildMatch;

/// An event raised by the host engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Event type identifier (e.g., "Device/Connected", "Voice/Captured")
    pub event_type: String,

    /// Subsystem that raised the event
    pub source: String,

    /// Event payload data
    #[serde(default)]
    pub data: serde_json::Value,

    /// Timestamp when event was created (Unix milliseconds)
    pub timestamp: u64,
}

impl EngineEvent {
    /// Create a new event
    pub fn new(
        event_type: impl Into<String>,
        source: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            data,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }

    /// Create an event without data
    pub fn now(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(event_type, source, serde_json::Value::Null)
    }

    /// Check if this event matches a wait pattern
    ///
    /// Patterns are wildcard expressions over the event type:
    /// `"Device/Connected"`, `"Device/*"`, `"*Captured"` or `"*"`.
    pub fn matches(&self, pattern: &str) -> bool {
        pattern == "*" || WildMatch::new(pattern).matches(&self.event_type)
    }

    /// Get a field from the event data
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}
