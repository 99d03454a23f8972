//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the process.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Shutdown timing.
    pub shutdown: ShutdownConfig,

    /// Listeners hosted by the process.
    pub listeners: Vec<ListenerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shutdown: ShutdownConfig::default(),
            listeners: vec![
                ListenerConfig::new("business", "localhost:8080"),
                ListenerConfig::new("admin", "localhost:8081"),
            ],
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Shutdown timing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Budget for the whole shutdown sequence in milliseconds.
    pub shutdown_timeout_ms: u64,

    /// Grace period for in-flight requests in milliseconds.
    pub wait_time_ms: u64,

    /// Deadline applied to each cleanup callback in milliseconds.
    pub callback_timeout_ms: u64,

    /// How often the drain phase checks for in-flight requests, in milliseconds.
    pub drain_poll_interval_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 30_000,
            wait_time_ms: 10_000,
            callback_timeout_ms: 3_000,
            drain_poll_interval_ms: 50,
        }
    }
}

/// One hosted listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    /// Name used in logs and metrics.
    pub name: String,

    /// Bind address (e.g., "localhost:8080").
    pub bind_address: String,
}

impl ListenerConfig {
    pub fn new(name: impl Into<String>, bind_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bind_address: bind_address.into(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
