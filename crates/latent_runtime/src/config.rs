//! Session Configuration
//!
//! Loaded from the `[session]` table of a host's TOML file, or built in code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name used in logs
    #[serde(default = "default_name")]
    pub name: String,
    /// Cap on resumptions delivered per tick; the rest wait for later ticks
    #[serde(default)]
    pub max_drain_per_tick: Option<usize>,
    /// Expose entry points that reach engine internals
    #[serde(default = "default_true")]
    pub dangerous_functions: bool,
    /// Priority for loads that do not pass one
    #[serde(default)]
    pub default_load_priority: i32,
}

fn default_name() -> String {
    "session".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_drain_per_tick: None,
            dangerous_functions: true,
            default_load_priority: 0,
        }
    }
}

impl SessionConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse from a TOML document holding the session fields at top level
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
