//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! section falls back to defaults so a minimal file only lists workers and
//! responders.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::reader::ReaderLimits;
use crate::protocol::session::SessionSettings;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener.
    pub listener: ListenerConfig,

    /// Worker processes. The list length fixes the ring capacity.
    pub workers: Vec<WorkerConfig>,

    /// Top-level responders in priority order.
    pub responders: Vec<ResponderConfig>,

    /// Chunk framing limits.
    pub protocol: ProtocolConfig,

    /// Worker ring settings.
    pub pool: PoolConfig,

    pub timeouts: TimeoutConfig,

    pub retries: RetryConfig,

    pub health_check: HealthCheckConfig,

    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// Session parameters derived from the protocol and timeout sections.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connect_timeout: Duration::from_secs(self.timeouts.connect_secs),
            read_timeout: Duration::from_secs(self.timeouts.read_secs),
            limits: ReaderLimits {
                initial_buffer_size: self.protocol.initial_buffer_size,
                max_buffer_size: self.protocol.max_buffer_size,
            },
            min_chunk_size: self.protocol.min_chunk_size,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// One worker process.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Unique worker identifier.
    pub name: String,

    /// TCP address (e.g., "127.0.0.1:9001").
    pub address: String,

    /// Maximum concurrent sessions against this worker.
    #[serde(default = "default_max_worker_conns")]
    pub max_connections: usize,
}

fn default_max_worker_conns() -> usize {
    16
}

/// A responder and its alternate representations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ResponderConfig {
    pub name: String,

    /// Path suffix, including the leading dot (e.g., ".dmr.xml").
    pub suffix: String,

    /// Media type of the representation.
    pub media_type: String,

    /// Worker command; `{resource}` is replaced by the resource id.
    pub command: String,

    #[serde(default)]
    pub alternates: Vec<ResponderConfig>,
}

/// Chunk framing limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Starting size of each reader's chunk buffer in bytes.
    pub initial_buffer_size: usize,

    /// Largest chunk a reader accepts in bytes.
    pub max_buffer_size: usize,

    /// Coalescing threshold for outgoing DATA chunks.
    pub min_chunk_size: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 10_240,
            max_buffer_size: 16 * 1024 * 1024,
            min_chunk_size: 65_535,
        }
    }
}

/// Worker ring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// How long a request waits for the ring before giving up.
    pub acquire_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 1_000,
        }
    }
}

/// Timeout configuration for worker exchanges.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connect and handshake timeout in seconds.
    pub connect_secs: u64,

    /// Per-read timeout on the worker stream in seconds.
    pub read_secs: u64,

    /// Whole request deadline in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            read_secs: 30,
            request_secs: 60,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries against the next worker.
    pub enabled: bool,

    /// Maximum number of attempts, the first included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the active handshake probe.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive failures before marking a worker unhealthy.
    pub unhealthy_threshold: usize,

    /// Consecutive successes before marking a worker healthy.
    pub healthy_threshold: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 2,
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
