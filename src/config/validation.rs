//! Configuration validation.
//!
//! Returns every problem found, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MessengerConfig;

const MAX_READ_BUFFER: usize = 64 * 1024;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a socket address")]
    InvalidAddress { field: &'static str, value: String },
    #[error("server.max_connections must be at least 1")]
    NoConnections,
    #[error("{field}: buffer size {size} must be between 1 and 65536")]
    BufferSize { field: &'static str, size: usize },
    #[error("{field} must be at least 1")]
    ZeroDuration { field: &'static str },
    #[error("client.keep_alive_secs ({keep_alive}) must be shorter than client.idle_timeout_secs ({idle})")]
    KeepAliveTooLong { keep_alive: u64, idle: u64 },
    #[error("server.max_streams_per_connection must be at least 1")]
    NoStreams,
    #[error("transport.alpn must not be empty")]
    EmptyAlpn,
    #[error("observability.log_level: unknown level '{0}'")]
    LogLevel(String),
}

/// Check value ranges and cross-field constraints.
pub fn validate_config(config: &MessengerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let addresses = [
        ("server.bind_address", &config.server.bind_address),
        ("client.server_address", &config.client.server_address),
        ("client.bind_address", &config.client.bind_address),
    ];
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.server.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let buffers = [
        ("server.read_buffer_size", config.server.read_buffer_size),
        ("client.read_buffer_size", config.client.read_buffer_size),
    ];
    for (field, size) in buffers {
        if size == 0 || size > MAX_READ_BUFFER {
            errors.push(ValidationError::BufferSize { field, size });
        }
    }

    let durations = [
        ("server.rejection_timeout_ms", config.server.rejection_timeout_ms),
        ("server.idle_timeout_secs", config.server.idle_timeout_secs),
        ("client.idle_timeout_secs", config.client.idle_timeout_secs),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if config.client.keep_alive_secs >= config.client.idle_timeout_secs {
        errors.push(ValidationError::KeepAliveTooLong {
            keep_alive: config.client.keep_alive_secs,
            idle: config.client.idle_timeout_secs,
        });
    }

    if config.server.max_streams_per_connection == 0 {
        errors.push(ValidationError::NoStreams);
    }

    if config.transport.alpn.is_empty() {
        errors.push(ValidationError::EmptyAlpn);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
