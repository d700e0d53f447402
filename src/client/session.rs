//! Client session: one connection, one stream, concurrent read and write.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::QuicClientConfig;
use quinn::{ConnectionError, Endpoint, IdleTimeout};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::net::connection::ConnectionId;
use crate::net::stream::{log_read_error, MessageReader, ReadEvent, Received};
use crate::net::tls::TlsError;
use crate::observability::metrics;
use crate::protocol::{CloseCode, Control, Message};

/// Console token that ends the session.
pub const EXIT_TOKEN: &str = "exit";

/// How long to wait for the peer to acknowledge our last frame before closing.
const LINGER: Duration = Duration::from_secs(1);

/// Error type for the dialer.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid address '{0}'")]
    Address(String),
    #[error("idle timeout out of range: {0}")]
    IdleTimeout(#[from] quinn::VarIntBoundsExceeded),
    #[error("failed to bind client endpoint: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to connect: {0}")]
    Connect(#[from] quinn::ConnectError),
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),
    #[error("connection rejected: maximum connection limit reached")]
    Rejected,
    #[error("failed to send data: {0}")]
    Write(#[source] quinn::WriteError),
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// How a session ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `exit` (or the line source closed).
    Exited,
    /// The listener refused the connection.
    Rejected,
    /// The connection went away for another reason.
    Disconnected(String),
}

/// An established dialer session.
pub struct ClientSession {
    id: ConnectionId,
    endpoint: Endpoint,
    connection: quinn::Connection,
    send: quinn::SendStream,
    recv: quinn::RecvStream,
    read_buffer_size: usize,
}

impl ClientSession {
    /// Dial the listener and open the session's stream.
    pub async fn connect(
        config: &ClientConfig,
        crypto: Arc<QuicClientConfig>,
    ) -> Result<Self, ClientError> {
        let bind: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|_| ClientError::Address(config.bind_address.clone()))?;
        let server: SocketAddr = config
            .server_address
            .parse()
            .map_err(|_| ClientError::Address(config.server_address.clone()))?;

        let mut transport = quinn::TransportConfig::default();
        transport
            .max_idle_timeout(Some(IdleTimeout::try_from(config.idle_timeout())?))
            .keep_alive_interval(Some(config.keep_alive()));
        let mut client_config = quinn::ClientConfig::new(crypto);
        client_config.transport_config(Arc::new(transport));

        let mut endpoint = Endpoint::client(bind).map_err(ClientError::Bind)?;
        endpoint.set_default_client_config(client_config);

        let connection = endpoint.connect(server, &config.server_name)?.await?;
        let id = ConnectionId::new();
        tracing::info!(connection_id = %id, server = %server, "Connected to server");

        let (send, recv) = connection.open_bi().await.map_err(|e| {
            if is_pool_full(&e) {
                ClientError::Rejected
            } else {
                ClientError::Connection(e)
            }
        })?;

        Ok(Self {
            id,
            endpoint,
            connection,
            send,
            recv,
            read_buffer_size: config.read_buffer_size,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connection(&self) -> &quinn::Connection {
        &self.connection
    }

    /// Drive the session until exit, rejection, disconnect or a write failure.
    ///
    /// Received text goes to `deliveries`; `outbound` supplies lines to send.
    pub async fn run(
        self,
        mut outbound: mpsc::Receiver<String>,
        deliveries: mpsc::UnboundedSender<Received>,
    ) -> Result<SessionEnd, ClientError> {
        let Self {
            id,
            endpoint,
            connection,
            send,
            recv,
            read_buffer_size,
        } = self;

        let (control_tx, mut control_rx) = mpsc::channel(4);
        tokio::spawn(read_loop(
            id,
            recv,
            read_buffer_size,
            deliveries.clone(),
            control_tx.clone(),
        ));
        tokio::spawn(accept_server_streams(
            id,
            connection.clone(),
            read_buffer_size,
            deliveries,
            control_tx,
        ));

        let mut writer = Writer {
            id,
            endpoint,
            connection,
            send,
        };
        loop {
            tokio::select! {
                biased;

                Some(control) = control_rx.recv() => match control {
                    Control::Rejected { reason } => {
                        tracing::warn!(connection_id = %id, reason = %reason, "Connection rejected by server");
                        return Ok(writer.acknowledge_rejection().await);
                    }
                    Control::Exit => {
                        tracing::debug!(connection_id = %id, "Ignoring exit notice from server");
                    }
                },
                error = writer.connection.closed() => {
                    return Ok(writer.on_closed(error).await);
                }
                line = outbound.recv() => match line {
                    Some(line) if line == EXIT_TOKEN => return writer.exit().await,
                    Some(line) => {
                        if !writer.send_text(line).await? {
                            return Ok(writer.acknowledge_rejection().await);
                        }
                    }
                    None => {
                        tracing::debug!(connection_id = %id, "Outbound line source closed");
                        return writer.exit().await;
                    }
                },
            }
        }
    }
}

/// Write half of a running session; owns the connection teardown.
struct Writer {
    id: ConnectionId,
    endpoint: Endpoint,
    connection: quinn::Connection,
    send: quinn::SendStream,
}

impl Writer {
    /// Returns `Ok(false)` when the write failed because the server rejected us.
    async fn send_text(&mut self, line: String) -> Result<bool, ClientError> {
        match self.send.write_all(&Message::Text(line).encode()).await {
            Ok(()) => {
                tracing::debug!(connection_id = %self.id, "Sent message");
                Ok(true)
            }
            Err(e) => {
                if self.connection.close_reason().as_ref().is_some_and(is_pool_full) {
                    return Ok(false);
                }
                tracing::error!(connection_id = %self.id, error = %e, "Failed to send data");
                Err(ClientError::Write(e))
            }
        }
    }

    /// Announce the exit, let it reach the peer, then close.
    ///
    /// The connection is closed even when the notice cannot be written.
    async fn exit(mut self) -> Result<SessionEnd, ClientError> {
        let exit = Message::Control(Control::Exit).encode();
        if let Err(e) = self.send.write_all(&exit).await {
            if self.connection.close_reason().as_ref().is_some_and(is_pool_full) {
                return Ok(self.acknowledge_rejection().await);
            }
            tracing::error!(connection_id = %self.id, error = %e, "Failed to send exit notice");
            self.close(CloseCode::ClientExit).await;
            return Err(ClientError::Write(e));
        }
        if self.send.finish().is_ok() {
            let _ = tokio::time::timeout(LINGER, self.send.stopped()).await;
        }
        tracing::info!(connection_id = %self.id, "Client closed connection");
        self.close(CloseCode::ClientExit).await;
        Ok(SessionEnd::Exited)
    }

    async fn acknowledge_rejection(mut self) -> SessionEnd {
        let _ = self.send.shutdown().await;
        self.close(CloseCode::RejectAck).await;
        SessionEnd::Rejected
    }

    async fn on_closed(self, error: ConnectionError) -> SessionEnd {
        if is_pool_full(&error) {
            tracing::warn!(connection_id = %self.id, "Connection rejected by server");
            return self.acknowledge_rejection().await;
        }
        tracing::info!(connection_id = %self.id, error = %error, "Connection closed");
        let _ = tokio::time::timeout(LINGER, self.endpoint.wait_idle()).await;
        SessionEnd::Disconnected(error.to_string())
    }

    async fn close(self, code: CloseCode) {
        code.close(&self.connection);
        // Give the close frame a chance to leave before the endpoint drops.
        let _ = tokio::time::timeout(LINGER, self.endpoint.wait_idle()).await;
    }
}

fn is_pool_full(error: &ConnectionError) -> bool {
    matches!(
        error,
        ConnectionError::ApplicationClosed(close)
            if CloseCode::from_varint(close.error_code) == Some(CloseCode::PoolFull)
    )
}

/// Read one stream, surfacing text and forwarding control signals.
async fn read_loop(
    id: ConnectionId,
    recv: quinn::RecvStream,
    buffer_size: usize,
    deliveries: mpsc::UnboundedSender<Received>,
    control: mpsc::Sender<Control>,
) {
    let mut reader = MessageReader::new(recv, buffer_size);
    loop {
        match reader.next().await {
            ReadEvent::Message(Message::Text(text)) => {
                metrics::record_message_received("client");
                let _ = deliveries.send(Received {
                    connection: id,
                    text,
                });
            }
            ReadEvent::Message(Message::Control(signal)) => {
                let stop = matches!(signal, Control::Rejected { .. });
                let _ = control.send(signal).await;
                if stop {
                    break;
                }
            }
            ReadEvent::Undecodable(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Dropping undecodable message");
            }
            ReadEvent::Finished => {
                tracing::debug!(connection_id = %id, "Stream finished by server");
                break;
            }
            ReadEvent::Failed(e) => {
                log_read_error(id, &e);
                break;
            }
        }
    }
}

/// The listener opens unidirectional streams to deliver notices.
async fn accept_server_streams(
    id: ConnectionId,
    connection: quinn::Connection,
    buffer_size: usize,
    deliveries: mpsc::UnboundedSender<Received>,
    control: mpsc::Sender<Control>,
) {
    while let Ok(recv) = connection.accept_uni().await {
        tokio::spawn(read_loop(
            id,
            recv,
            buffer_size,
            deliveries.clone(),
            control.clone(),
        ));
    }
}
