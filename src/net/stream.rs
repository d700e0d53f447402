//! Per-stream read loop.
//!
//! Each read fills at most one bounded buffer. Text in a read is surfaced
//! as it arrives, so a line longer than the buffer comes out in several
//! pieces. Control frames inside a read are split out and acted upon.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::protocol::{Control, DecodeError, Message};

/// A text payload surfaced to the console (or a test).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub connection: ConnectionId,
    pub text: String,
}

/// One step of a [`MessageReader`].
#[derive(Debug)]
pub enum ReadEvent {
    Message(Message),
    Undecodable(DecodeError),
    /// Peer finished the stream.
    Finished,
    Failed(io::Error),
}

/// Reads messages from an ordered byte stream, one bounded read at a time.
pub struct MessageReader<R> {
    inner: R,
    buf: Vec<u8>,
    pending: VecDeque<Result<Message, DecodeError>>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buf: vec![0; buffer_size.max(1)],
            pending: VecDeque::new(),
        }
    }

    pub async fn next(&mut self) -> ReadEvent {
        loop {
            match self.pending.pop_front() {
                Some(Ok(message)) => return ReadEvent::Message(message),
                Some(Err(e)) => return ReadEvent::Undecodable(e),
                None => {}
            }
            match self.inner.read(&mut self.buf).await {
                Ok(0) => return ReadEvent::Finished,
                Ok(n) => self.pending.extend(Message::decode(&self.buf[..n])),
                Err(e) => return ReadEvent::Failed(e),
            }
        }
    }
}

/// Listener-side handler for one accepted stream.
pub struct StreamHandler<R, W> {
    connection: ConnectionId,
    reader: MessageReader<R>,
    writer: Option<W>,
    echo: bool,
    deliveries: mpsc::UnboundedSender<Received>,
}

impl<R, W> StreamHandler<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// `writer` is the send half of a bidirectional stream, `None` for a
    /// unidirectional one.
    pub fn new(
        connection: ConnectionId,
        reader: R,
        writer: Option<W>,
        buffer_size: usize,
        echo: bool,
        deliveries: mpsc::UnboundedSender<Received>,
    ) -> Self {
        Self {
            connection,
            reader: MessageReader::new(reader, buffer_size),
            writer,
            echo,
            deliveries,
        }
    }

    /// Read until end of stream, an exit notice or a read error.
    pub async fn run(mut self) {
        let connection_id = self.connection;
        loop {
            match self.reader.next().await {
                ReadEvent::Message(Message::Text(text)) => {
                    metrics::record_message_received("server");
                    if self.echo {
                        self.echo_back(&text).await;
                    }
                    let _ = self.deliveries.send(Received {
                        connection: connection_id,
                        text,
                    });
                }
                ReadEvent::Message(Message::Control(Control::Exit)) => {
                    tracing::info!(connection_id = %connection_id, "Peer announced exit");
                    break;
                }
                ReadEvent::Message(Message::Control(control)) => {
                    tracing::warn!(connection_id = %connection_id, ?control, "Unexpected control message");
                }
                ReadEvent::Undecodable(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Dropping undecodable message");
                }
                ReadEvent::Finished => {
                    tracing::debug!(connection_id = %connection_id, "Stream finished by peer");
                    break;
                }
                ReadEvent::Failed(e) => {
                    log_read_error(connection_id, &e);
                    break;
                }
            }
        }

        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
    }

    async fn echo_back(&mut self, text: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(e) = writer.write_all(&Message::text(text).encode()).await {
            tracing::warn!(connection_id = %self.connection, error = %e, "Failed to echo message");
            self.writer = None;
        }
    }
}

/// Log a read failure; a vanished connection is routine, anything else is not.
pub fn log_read_error(connection_id: ConnectionId, error: &io::Error) {
    match error.kind() {
        io::ErrorKind::NotConnected | io::ErrorKind::ConnectionReset => {
            tracing::info!(connection_id = %connection_id, error = %error, "Stream closed while reading");
        }
        _ => {
            tracing::warn!(connection_id = %connection_id, error = %error, "Error reading from stream");
        }
    }
}
