//! Relay daemon configuration

use anyhow::Result;
use relay_lib::ingest::DEFAULT_COLLECT_BUFFER_SIZE;
use relay_lib::{CorrelationLimits, SessionConfig};
use serde::Deserialize;

/// Daemon configuration, loaded from RELAY_* environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// gRPC listen port for watcher connections
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// HTTP port for health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Reducer ingest endpoint (host:port)
    #[serde(default = "default_reducer_endpoint")]
    pub reducer_endpoint: String,

    /// Byte budget of the per-session collect buffer
    #[serde(default = "default_collect_buffer_size")]
    pub collect_buffer_size: usize,

    /// Pods allowed to wait for an unseen owner before a forced resync
    #[serde(default = "default_max_waiting_pods")]
    pub max_waiting_pods: usize,

    /// Tombstoned owners retained before the oldest is purged
    #[serde(default = "default_max_deleted_owners")]
    pub max_deleted_owners: usize,
}

fn default_listen_port() -> u16 {
    8712
}

fn default_api_port() -> u16 {
    8080
}

fn default_reducer_endpoint() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_collect_buffer_size() -> usize {
    DEFAULT_COLLECT_BUFFER_SIZE
}

fn default_max_waiting_pods() -> usize {
    10_000
}

fn default_max_deleted_owners() -> usize {
    10_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            api_port: default_api_port(),
            reducer_endpoint: default_reducer_endpoint(),
            collect_buffer_size: default_collect_buffer_size(),
            max_waiting_pods: default_max_waiting_pods(),
            max_deleted_owners: default_max_deleted_owners(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RELAY"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Per-session tunables handed to the collect service
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            collect_buffer_size: self.collect_buffer_size,
            limits: CorrelationLimits {
                max_waiting_pods: self.max_waiting_pods,
                max_deleted_owners: self.max_deleted_owners,
            },
        }
    }
}
