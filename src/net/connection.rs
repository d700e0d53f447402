//! Connection identity and the per-connection stream acceptor.

use std::sync::atomic::{AtomicU64, Ordering};

use quinn::ConnectionError;
use tokio::sync::mpsc;

use crate::net::admission::AdmissionSlot;
use crate::net::stream::{Received, StreamHandler};
use crate::observability::metrics;
use crate::protocol::CloseCode;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Settings every stream of an admitted connection shares.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub read_buffer_size: usize,
    pub echo: bool,
}

/// Owns one admitted connection for its whole lifetime.
pub struct ConnectionHandler {
    id: ConnectionId,
    connection: quinn::Connection,
    slot: AdmissionSlot,
    settings: StreamSettings,
    deliveries: mpsc::UnboundedSender<Received>,
}

impl ConnectionHandler {
    pub fn new(
        id: ConnectionId,
        connection: quinn::Connection,
        slot: AdmissionSlot,
        settings: StreamSettings,
        deliveries: mpsc::UnboundedSender<Received>,
    ) -> Self {
        Self {
            id,
            connection,
            slot,
            settings,
            deliveries,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Accept streams until the connection goes away, then give the slot back.
    pub async fn run(self) {
        let id = self.id;
        let error = loop {
            tokio::select! {
                bi = self.connection.accept_bi() => match bi {
                    Ok((send, recv)) => self.spawn_stream(recv, Some(send)),
                    Err(e) => break e,
                },
                uni = self.connection.accept_uni() => match uni {
                    Ok(recv) => self.spawn_stream(recv, None),
                    Err(e) => break e,
                },
            }
        };

        log_termination(id, &error);
        drop(self.slot);
    }

    fn spawn_stream(&self, recv: quinn::RecvStream, send: Option<quinn::SendStream>) {
        metrics::record_stream_opened();
        tracing::debug!(
            connection_id = %self.id,
            stream_id = %recv.id(),
            bidirectional = send.is_some(),
            "Stream accepted"
        );
        let handler = StreamHandler::new(
            self.id,
            recv,
            send,
            self.settings.read_buffer_size,
            self.settings.echo,
            self.deliveries.clone(),
        );
        tokio::spawn(handler.run());
    }
}

fn log_termination(id: ConnectionId, error: &ConnectionError) {
    match error {
        ConnectionError::ApplicationClosed(close) => {
            let reason = CloseCode::from_varint(close.error_code);
            tracing::info!(
                connection_id = %id,
                code = %close.error_code,
                reason = ?reason,
                "Connection closed by peer"
            );
        }
        ConnectionError::LocallyClosed => {
            tracing::debug!(connection_id = %id, "Connection closed locally");
        }
        ConnectionError::TimedOut => {
            tracing::info!(connection_id = %id, "Connection idle timeout");
        }
        other => {
            tracing::warn!(connection_id = %id, error = %other, "Failed to accept stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), format!("conn-{}", id.as_u64()));
    }
}
