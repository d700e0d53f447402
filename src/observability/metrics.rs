//! Metrics collection and exposition.
//!
//! # Metrics
//! - `messenger_connections_accepted_total` (counter): admitted connections
//! - `messenger_connections_rejected_total` (counter): pool-full rejections
//! - `messenger_active_connections` (gauge): connections holding a slot
//! - `messenger_streams_opened_total` (counter): streams accepted by handlers
//! - `messenger_messages_received_total` (counter): payloads surfaced, by role

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_connection_accepted(active: usize) {
    metrics::counter!("messenger_connections_accepted_total").increment(1);
    metrics::gauge!("messenger_active_connections").set(active as f64);
}

pub fn record_connection_closed(active: usize) {
    metrics::gauge!("messenger_active_connections").set(active as f64);
}

pub fn record_connection_rejected() {
    metrics::counter!("messenger_connections_rejected_total").increment(1);
}

pub fn record_stream_opened() {
    metrics::counter!("messenger_streams_opened_total").increment(1);
}

pub fn record_message_received(role: &'static str) {
    metrics::counter!("messenger_messages_received_total", "role" => role).increment(1);
}
