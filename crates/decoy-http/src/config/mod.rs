//! Configuration for the decoy server.
//!
//! Loaded from YAML; every section is optional and command-line flags
//! override what the file sets.

mod client;
mod listen;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use client::{ClientConfig, WebhookConfig};
pub use listen::ListenConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub initialization: InitializationConfig,
    /// Default filter when `RUST_LOG` is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Oldest recorded requests are dropped beyond this
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_log_entries: default_max_log_entries(),
        }
    }
}

fn default_max_log_entries() -> usize {
    crate::store::DEFAULT_MAX_LOG_ENTRIES
}

/// Expectations loaded before the listener accepts traffic.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InitializationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectations_file: Option<PathBuf>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.host.trim().is_empty() {
            anyhow::bail!("listen.host must not be empty");
        }
        if self.client.connect_timeout_ms == 0 {
            anyhow::bail!("client.connect_timeout_ms must be greater than 0");
        }
        if self.client.request_timeout_ms == 0 {
            anyhow::bail!("client.request_timeout_ms must be greater than 0");
        }
        if self.webhooks.queue_size == 0 {
            anyhow::bail!("webhooks.queue_size must be greater than 0");
        }
        if self.store.max_log_entries == 0 {
            anyhow::bail!("store.max_log_entries must be greater than 0");
        }
        if let Some(level) = &self.log_level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                anyhow::bail!(
                    "Unsupported log_level '{}'. Expected one of: {}",
                    level,
                    LOG_LEVELS.join(", ")
                );
            }
        }
        if let Some(path) = &self.initialization.expectations_file {
            if !path.is_file() {
                anyhow::bail!(
                    "initialization.expectations_file '{}' does not exist",
                    path.display()
                );
            }
        }
        Ok(())
    }
}
