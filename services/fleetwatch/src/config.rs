//! Configuration types for the fleetwatch service

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Monitoring stream connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_stream_port")]
    pub port: u16,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_stream_port(),
            connection_timeout_seconds: default_connection_timeout(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Retry policy for the stream connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection when the connection is lost
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    /// Interval between reconnection attempts in seconds
    #[serde(default = "default_reconnect_interval")]
    pub interval_seconds: u64,
    /// Maximum number of reconnection attempts (None for unlimited)
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Delay before resending a subscription that could not go out yet
    #[serde(default = "default_resubscribe_delay")]
    pub resubscribe_delay_seconds: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            interval_seconds: default_reconnect_interval(),
            max_retries: None,
            resubscribe_delay_seconds: default_resubscribe_delay(),
        }
    }
}

/// REST API settings for the downtime ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Bearer credential applied to ledger requests and subscribe frames
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            auth_token: None,
        }
    }
}

/// What the service binary watches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Server identifiers to subscribe to on startup
    #[serde(default)]
    pub servers: Vec<String>,
    /// Interval between downtime ledger refreshes in seconds
    #[serde(default = "default_downtime_poll_interval")]
    pub downtime_poll_interval_seconds: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            downtime_poll_interval_seconds: default_downtime_poll_interval(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_stream_port() -> u16 {
    7700
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_reconnect_enabled() -> bool {
    true
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_resubscribe_delay() -> u64 {
    1
}

fn default_api_base_url() -> String {
    "http://localhost:7701/api".to_string()
}

fn default_downtime_poll_interval() -> u64 {
    60
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::FleetError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
