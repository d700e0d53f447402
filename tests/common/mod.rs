//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quic_messenger::client::{ClientError, ClientSession, SessionEnd};
use quic_messenger::config::{ClientConfig, ServerConfig};
use quic_messenger::lifecycle::Shutdown;
use quic_messenger::net::{tls, AdmissionController, Listener, ListenerError, Received};
use quic_messenger::protocol::DEFAULT_ALPN;
use quinn::crypto::rustls::QuicClientConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Self-signed certificate for "localhost" as (cert PEM, key PEM).
pub fn self_signed() -> (String, String) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    (certified.cert.pem(), certified.key_pair.serialize_pem())
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub cert_pem: String,
    pub admission: AdmissionController,
    pub shutdown: Shutdown,
    pub received: mpsc::UnboundedReceiver<Received>,
    pub task: JoinHandle<Result<(), ListenerError>>,
}

impl TestServer {
    pub fn client_crypto(&self) -> Arc<QuicClientConfig> {
        tls::client_crypto(Some(self.cert_pem.as_bytes()), DEFAULT_ALPN).unwrap()
    }

    pub fn client_config(&self) -> ClientConfig {
        client_config(self.addr)
    }

    pub async fn connect(&self) -> ClientSession {
        ClientSession::connect(&self.client_config(), self.client_crypto())
            .await
            .expect("client connects")
    }

    /// Next text received by the server, failing after a second.
    pub async fn next_text(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(1), self.received.recv())
            .await
            .expect("server received a message in time")
            .expect("delivery channel open")
            .text
    }
}

/// Start a listener on an ephemeral localhost port.
pub async fn start_server(max_connections: usize, echo: bool) -> TestServer {
    let (cert_pem, key_pem) = self_signed();
    let crypto = tls::server_crypto(cert_pem.as_bytes(), key_pem.as_bytes(), DEFAULT_ALPN).unwrap();

    let config = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_connections,
        echo,
        rejection_timeout_ms: 1_000,
        ..ServerConfig::default()
    };

    let shutdown = Shutdown::new();
    let (deliveries, received) = mpsc::unbounded_channel();
    let listener = Listener::bind(&config, crypto, shutdown.clone(), deliveries).unwrap();
    let addr = listener.local_addr().unwrap();
    let admission = listener.admission();
    let task = tokio::spawn(listener.run());

    TestServer {
        addr,
        cert_pem,
        admission,
        shutdown,
        received,
        task,
    }
}

pub fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_address: addr.to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        ..ClientConfig::default()
    }
}

/// A running client session driven by a line channel.
pub struct RunningClient {
    pub lines: mpsc::Sender<String>,
    pub received: mpsc::UnboundedReceiver<Received>,
    pub task: JoinHandle<Result<SessionEnd, ClientError>>,
}

impl RunningClient {
    pub async fn send(&self, line: &str) {
        self.lines.send(line.to_string()).await.expect("session still reading lines");
    }

    pub async fn finish(self) -> Result<SessionEnd, ClientError> {
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("session ended in time")
            .expect("session task did not panic")
    }
}

pub fn spawn_session(session: ClientSession) -> RunningClient {
    let (lines, outbound) = mpsc::channel(8);
    let (deliveries, received) = mpsc::unbounded_channel();
    let task = tokio::spawn(session.run(outbound, deliveries));
    RunningClient {
        lines,
        received,
        task,
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn is_rejection(outcome: &Result<SessionEnd, ClientError>) -> bool {
    matches!(outcome, Ok(SessionEnd::Rejected) | Err(ClientError::Rejected))
}

/// Await `future`, failing the test after `secs` seconds.
pub async fn within<T>(secs: u64, future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(secs), future)
        .await
        .expect("completed in time")
}
