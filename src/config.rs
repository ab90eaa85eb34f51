use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Probed URLs. Fixed at build time; no input can change them.
pub const TARGETS: [&str; 2] = ["https://httpstat.us/503", "https://httpstat.us/200"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProbeConfig {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub on_transport_error: TransportErrorPolicy,
}

/// What the scheduler does with a failure that is neither a response nor a timeout.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorPolicy {
    /// Propagate the error and stop the probe loop.
    #[default]
    Crash,
    /// Record the target as down with infinite latency and keep going.
    MarkDown,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            timeout_ms: default_timeout(),
            on_transport_error: TransportErrorPolicy::default(),
        }
    }
}

fn default_metrics_port() -> u16 { 80 }
pub fn default_timeout() -> u64 { 5000 }

/// Loads `path` if it exists, otherwise falls back to defaults.
pub fn load(path: impl AsRef<Path>) -> Result<ProbeConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(ProbeConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}
