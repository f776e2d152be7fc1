//! Service configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Service configuration, loaded from JSON or created with defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// VAM endpoint.
    pub vam_addr: SocketAddr,
    /// CM endpoint.
    pub cm_addr: SocketAddr,
    /// Data root; storage and logs land under `<data_dir>/ASI_DATA`.
    pub data_dir: PathBuf,
    /// Seconds between parent snapshots.
    pub snapshot_interval_secs: u64,
    /// Child restarts tolerated within the monitoring window.
    pub max_child_restarts: u32,
    /// Monitoring window for child restarts, in seconds.
    pub restart_window_secs: u64,
    /// Seconds to wait for the child after SIGTERM before giving up.
    pub child_term_grace_secs: u64,
    /// Apply `SCHED_FIFO` priorities and memory locking to worker tasks.
    pub realtime: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            vam_addr: asi_runtime::DEFAULT_VAM_ADDR
                .parse()
                .expect("default VAM addr parses"),
            cm_addr: asi_runtime::DEFAULT_CM_ADDR
                .parse()
                .expect("default CM addr parses"),
            data_dir: PathBuf::from("."),
            snapshot_interval_secs: 2,
            max_child_restarts: 5,
            restart_window_secs: 60,
            child_term_grace_secs: 5,
            realtime: true,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `path`, creating it with defaults when it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files or invalid JSON.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let config: ServiceConfig = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config {}", path.display()))?;
            debug!(path = %path.display(), "loaded config");
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            info!(path = %path.display(), "created default config");
            Ok(config)
        }
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Propagates filesystem and serialization errors.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("failed to create config directory")?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}
