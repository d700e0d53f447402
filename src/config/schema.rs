//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_ALPN;

/// Root configuration for both peer roles.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MessengerConfig {
    /// Listener role settings.
    pub server: ServerConfig,

    /// Dialer role settings.
    pub client: ClientConfig,

    /// Settings both roles must agree on.
    pub transport: TransportConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:4242").
    pub bind_address: String,

    /// Path to certificate chain (PEM).
    pub cert_path: String,

    /// Path to private key (PEM).
    pub key_path: String,

    /// Maximum concurrently admitted connections.
    pub max_connections: usize,

    /// Size of the buffer each stream read fills.
    pub read_buffer_size: usize,

    /// Upper bound on delivering a rejection notice before closing.
    pub rejection_timeout_ms: u64,

    /// Concurrent streams a single peer may hold open.
    pub max_streams_per_connection: u32,

    /// Idle timeout applied to accepted connections.
    pub idle_timeout_secs: u64,

    /// Write every received text back on the stream it arrived on.
    pub echo: bool,
}

impl ServerConfig {
    pub fn rejection_timeout(&self) -> Duration {
        Duration::from_millis(self.rejection_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4242".to_string(),
            cert_path: "cert.pem".to_string(),
            key_path: "key.pem".to_string(),
            max_connections: 5,
            read_buffer_size: 1024,
            rejection_timeout_ms: 2_000,
            max_streams_per_connection: 100,
            idle_timeout_secs: 60,
            echo: false,
        }
    }
}

/// Dialer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Listener address to dial.
    pub server_address: String,

    /// Name checked against the server certificate.
    pub server_name: String,

    /// Local UDP address of the client endpoint.
    pub bind_address: String,

    /// CA certificate (PEM) used to verify the server.
    /// When absent the server certificate is not verified.
    pub ca_cert_path: Option<String>,

    /// Maximum time the connection may stay idle.
    pub idle_timeout_secs: u64,

    /// Keep-alive interval; must be shorter than the idle timeout.
    pub keep_alive_secs: u64,

    /// Size of the buffer each stream read fills.
    pub read_buffer_size: usize,
}

impl ClientConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:4242".to_string(),
            server_name: "localhost".to_string(),
            bind_address: "0.0.0.0:0".to_string(),
            ca_cert_path: None,
            idle_timeout_secs: 60,
            keep_alive_secs: 15,
            read_buffer_size: 1024,
        }
    }
}

/// Settings shared by both roles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Application protocol negotiated during the handshake.
    pub alpn: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            alpn: DEFAULT_ALPN.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
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
