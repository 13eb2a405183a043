//! Agent configuration — defaults, optional JSON file, environment overrides.
//!
//! Resolution order (later wins):
//!   1. built-in defaults (see `constants`)
//!   2. JSON file passed to `AgentConfig::load`
//!   3. `WARP_*` environment variables

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::{WarpError, WarpResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Master switch. Developer mode on the host is still required.
    pub enabled: bool,
    /// Fixed port; `None` scans the default block.
    pub port: Option<u16>,
    /// Shared secret forwarded to the peer in the handshake.
    pub nonce: Option<String>,
    /// Set when the host process was launched by the peer tool.
    pub is_managed: bool,
    pub open_timeout_ms: u64,
    pub close_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub init_poll_interval_ms: u64,
    pub read_poll_interval_ms: u64,
    pub outbound_queue_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: None,
            nonce: None,
            is_managed: false,
            open_timeout_ms: constants::OPEN_TIMEOUT_MS,
            close_timeout_ms: constants::CLOSE_TIMEOUT_MS,
            retry_backoff_ms: constants::RETRY_BACKOFF_MS,
            init_poll_interval_ms: constants::INIT_PHASE_POLL_MS,
            read_poll_interval_ms: constants::READ_POLL_MS,
            outbound_queue_capacity: constants::OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

impl AgentConfig {
    /// Defaults with the process environment applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup` instead of the real env.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup);
        config
    }

    /// Load `path` (missing fields take defaults), then apply the environment.
    /// A missing or invalid file yields defaults.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Using default agent config");
            Self::default()
        });
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Strict file read, no environment.
    pub fn from_file(path: &Path) -> WarpResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| WarpError::Config(format!("{}: {}", path.display(), e)))
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(constants::ENV_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => self.port = Some(port),
                _ => tracing::warn!(
                    var = constants::ENV_PORT,
                    value = %raw,
                    "Ignoring invalid port override"
                ),
            }
        }
        if let Some(raw) = lookup(constants::ENV_ENABLED) {
            self.enabled = !is_falsy(&raw);
        }
        if let Some(nonce) = lookup(constants::ENV_NONCE) {
            if !nonce.is_empty() {
                self.nonce = Some(nonce);
            }
        }
        if let Some(raw) = lookup(constants::ENV_IS_MANAGED) {
            self.is_managed = is_truthy(&raw);
        }
    }

    /// Candidate ports, ascending. A fixed port is a range of one.
    pub fn port_range(&self) -> Vec<u16> {
        match self.port {
            Some(port) => vec![port],
            None => (constants::DEFAULT_PORT_START..=constants::DEFAULT_PORT_END).collect(),
        }
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn init_poll_interval(&self) -> Duration {
        Duration::from_millis(self.init_poll_interval_ms)
    }

    pub fn read_poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_poll_interval_ms.max(1))
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn is_falsy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
