//! Outbound client and webhook queue configuration.

use serde::{Deserialize, Serialize};

/// Pooled client used for forwards and webhooks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_request_timeout() -> u64 {
    60_000
}

fn default_max_idle_per_host() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

fn default_queue_size() -> usize {
    crate::action::webhook::DEFAULT_QUEUE_SIZE
}
