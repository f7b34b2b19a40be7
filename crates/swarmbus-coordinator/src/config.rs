//! Coordinator configuration.
//!
//! Loaded from TOML (default `~/.config/swarmbus/config.toml`), every field
//! optional with the documented defaults. CLI flags override file values in
//! the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use swarmbus_protocol::{
    CONSENSUS_TIMEOUT_MS, DEFAULT_GOSSIP_INTERVAL_MS, DEFAULT_HEARTBEAT_INTERVAL_MS,
    DISTRIBUTION_INTERVAL_MS, GOSSIP_FANOUT, MESSAGES_PER_BAND_PER_TICK, MESSAGE_HISTORY_CAP,
    PROCESS_INTERVAL_MS, TASKS_PER_DISTRIBUTION_TICK,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Stable node identity. Generated when absent.
    pub node_id: Option<String>,
    pub heartbeat_interval_ms: u64,
    pub process_interval_ms: u64,
    pub gossip_interval_ms: u64,
    pub distribution_interval_ms: u64,
    pub consensus_timeout_ms: u64,
    pub tasks_per_tick: usize,
    pub messages_per_band_per_tick: usize,
    pub message_history_cap: usize,
    pub gossip_fanout: usize,
    /// Seed for reproducible gossip peer sampling (tests only).
    pub gossip_seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            process_interval_ms: PROCESS_INTERVAL_MS,
            gossip_interval_ms: DEFAULT_GOSSIP_INTERVAL_MS,
            distribution_interval_ms: DISTRIBUTION_INTERVAL_MS,
            consensus_timeout_ms: CONSENSUS_TIMEOUT_MS,
            tasks_per_tick: TASKS_PER_DISTRIBUTION_TICK,
            messages_per_band_per_tick: MESSAGES_PER_BAND_PER_TICK,
            message_history_cap: MESSAGE_HISTORY_CAP,
            gossip_fanout: GOSSIP_FANOUT,
            gossip_seed: None,
        }
    }
}

impl CoordinatorConfig {
    /// `~/.config/swarmbus/config.toml` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("swarmbus").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, crate::error::CoordinatorError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Load from `path` when given, else from the default path when the
    /// file exists, else built-in defaults.
    pub fn load_or_default(
        path: Option<&Path>,
    ) -> Result<Self, crate::error::CoordinatorError> {
        match path {
            Some(p) => Self::load(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }
}
