//! Host Configuration
//!
//! Structure of the host's TOML file:
//!
//! ```toml
//! [session]
//! name = "arena"
//! max_drain_per_tick = 32
//!
//! [host]
//! tick_interval_ms = 16
//! max_ticks = 120
//! asset_latency_ms = 40
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use latent_runtime::SessionConfig;

/// Host file (host.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub host: LoopConfig,
}

/// Tick loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Simulated streaming time for asset loads
    #[serde(default = "default_asset_latency")]
    pub asset_latency_ms: u64,
}

fn default_tick_interval() -> u64 {
    16
}

fn default_max_ticks() -> u64 {
    120
}

fn default_asset_latency() -> u64 {
    40
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            max_ticks: default_max_ticks(),
            asset_latency_ms: default_asset_latency(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid host config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_toml_str("").unwrap();
        assert_eq!(config.host, LoopConfig::default());
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_load_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [session]
            name = "arena"
            dangerous_functions = false

            [host]
            max_ticks = 10
            "#
        )
        .unwrap();

        let config = HostConfig::load(file.path()).unwrap();
        assert_eq!(config.session.name, "arena");
        assert!(!config.session.dangerous_functions);
        assert_eq!(config.host.max_ticks, 10);
        assert_eq!(config.host.tick_interval_ms, 16);
    }

    #[test]
    fn test_missing_file() {
        let err = HostConfig::load(Path::new("/no/such/host.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
