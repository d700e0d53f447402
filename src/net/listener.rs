//! QUIC listener and acceptor loop with admission control.
//!
//! # Responsibilities
//! - Bind the QUIC endpoint with the configured transport limits
//! - Accept incoming connections without ever waiting on admission
//! - Hand admitted connections to a [`ConnectionHandler`]
//! - Reject connections past `max_connections` with a notice and close code
//! - Stop cleanly once shutdown has been triggered

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::QuicServerConfig;
use quinn::{Endpoint, IdleTimeout, VarInt};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::admission::AdmissionController;
use crate::net::connection::{ConnectionHandler, ConnectionId, StreamSettings};
use crate::net::stream::Received;
use crate::observability::metrics;
use crate::protocol::{CloseCode, Message};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address '{0}'")]
    Address(String),
    #[error("idle timeout out of range: {0}")]
    IdleTimeout(#[from] quinn::VarIntBoundsExceeded),
    #[error("failed to bind: {0}")]
    Bind(#[source] std::io::Error),
    #[error("endpoint closed while not shutting down")]
    EndpointClosed,
}

/// Why a rejection notice could not be delivered.
#[derive(Debug, Error)]
enum RejectionError {
    #[error("failed to open stream: {0}")]
    Open(#[from] quinn::ConnectionError),
    #[error("failed to write: {0}")]
    Write(#[from] quinn::WriteError),
    #[error("failed to finish stream: {0}")]
    Finish(#[from] quinn::ClosedStream),
    #[error("stream not acknowledged: {0}")]
    Stopped(#[from] quinn::StoppedError),
}

/// Everything a handshake task needs to admit or reject its connection.
#[derive(Clone)]
struct Gate {
    admission: AdmissionController,
    settings: StreamSettings,
    rejection_timeout: Duration,
    deliveries: mpsc::UnboundedSender<Received>,
}

/// A QUIC listener that bounds concurrently active connections.
pub struct Listener {
    endpoint: Endpoint,
    shutdown: Shutdown,
    gate: Gate,
}

impl Listener {
    /// Bind to the configured address.
    pub fn bind(
        config: &ServerConfig,
        crypto: Arc<QuicServerConfig>,
        shutdown: Shutdown,
        deliveries: mpsc::UnboundedSender<Received>,
    ) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|_| ListenerError::Address(config.bind_address.clone()))?;

        let streams = VarInt::from_u32(config.max_streams_per_connection);
        let mut transport = quinn::TransportConfig::default();
        transport
            .max_idle_timeout(Some(IdleTimeout::try_from(config.idle_timeout())?))
            .max_concurrent_bidi_streams(streams)
            .max_concurrent_uni_streams(streams);

        let mut server_config = quinn::ServerConfig::with_crypto(crypto);
        server_config.transport_config(Arc::new(transport));

        let endpoint = Endpoint::server(server_config, addr).map_err(ListenerError::Bind)?;
        let local_addr = endpoint.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            endpoint,
            shutdown,
            gate: Gate {
                admission: AdmissionController::new(config.max_connections),
                settings: StreamSettings {
                    read_buffer_size: config.read_buffer_size,
                    echo: config.echo,
                },
                rejection_timeout: config.rejection_timeout(),
                deliveries,
            },
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.endpoint.local_addr()
    }

    /// Handle on the admission pool, for inspection.
    pub fn admission(&self) -> AdmissionController {
        self.gate.admission.clone()
    }

    /// Run the acceptor loop until the endpoint closes.
    ///
    /// Returns `Ok` when the endpoint closed because shutdown was triggered.
    pub async fn run(self) -> Result<(), ListenerError> {
        let closer = tokio::spawn(close_on_shutdown(
            self.endpoint.clone(),
            self.shutdown.subscribe(),
        ));

        let result = loop {
            let Some(incoming) = self.endpoint.accept().await else {
                if self.shutdown.is_triggered() {
                    break Ok(());
                }
                tracing::error!("Endpoint stopped accepting connections");
                break Err(ListenerError::EndpointClosed);
            };

            let gate = self.gate.clone();
            tokio::spawn(async move {
                let remote = incoming.remote_address();
                match incoming.await {
                    Ok(connection) => gate.admit(connection).await,
                    Err(e) => {
                        tracing::warn!(remote = %remote, error = %e, "Failed to accept connection");
                    }
                }
            });
        };

        closer.abort();
        self.endpoint.wait_idle().await;
        tracing::info!("Listener stopped");
        result
    }
}

impl Gate {
    async fn admit(self, connection: quinn::Connection) {
        let id = ConnectionId::new();
        let Some(slot) = self.admission.try_acquire() else {
            reject(id, connection, self.rejection_timeout).await;
            return;
        };

        metrics::record_connection_accepted(self.admission.held());
        tracing::info!(
            connection_id = %id,
            remote = %connection.remote_address(),
            held = self.admission.held(),
            "New connection accepted"
        );

        ConnectionHandler::new(id, connection, slot, self.settings, self.deliveries)
            .run()
            .await;
    }
}

/// Best effort: tell the peer why, then close regardless of the outcome.
async fn reject(id: ConnectionId, connection: quinn::Connection, timeout: Duration) {
    metrics::record_connection_rejected();
    tracing::warn!(
        connection_id = %id,
        remote = %connection.remote_address(),
        "Maximum connections reached, rejecting"
    );

    match tokio::time::timeout(timeout, send_rejection(&connection)).await {
        Ok(Ok(())) => tracing::debug!(connection_id = %id, "Rejection notice delivered"),
        Ok(Err(e)) => {
            tracing::warn!(connection_id = %id, error = %e, "Failed to send rejection message");
        }
        Err(_) => {
            tracing::warn!(connection_id = %id, ?timeout, "Timed out sending rejection message");
        }
    }

    CloseCode::PoolFull.close(&connection);
}

async fn send_rejection(connection: &quinn::Connection) -> Result<(), RejectionError> {
    let mut send = connection.open_uni().await?;
    send.write_all(&Message::rejection().encode()).await?;
    send.finish()?;
    // Resolves once the peer has acknowledged every byte (or stopped the stream).
    send.stopped().await?;
    Ok(())
}

async fn close_on_shutdown(endpoint: Endpoint, mut signal: ShutdownSignal) {
    signal.triggered().await;
    tracing::info!("Closing endpoint");
    endpoint.close(CloseCode::ServerShutdown.into(), CloseCode::ServerShutdown.reason());
}
