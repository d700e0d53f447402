//! Client session behavior against the real listener and scripted peers.

use std::time::Duration;

use quic_messenger::client::{ClientSession, SessionEnd};
use quic_messenger::net::tls;
use quic_messenger::protocol::{CloseCode, Control, Message, DEFAULT_ALPN, REJECTION_NOTICE};

mod common;

/// A bare QUIC endpoint with the listener's crypto but none of its logic.
fn scripted_peer() -> (quinn::Endpoint, String) {
    let (cert_pem, key_pem) = common::self_signed();
    let crypto = tls::server_crypto(cert_pem.as_bytes(), key_pem.as_bytes(), DEFAULT_ALPN).unwrap();
    let endpoint = quinn::Endpoint::server(
        quinn::ServerConfig::with_crypto(crypto),
        "127.0.0.1:0".parse().unwrap(),
    )
    .unwrap();
    (endpoint, cert_pem)
}

async fn dial(endpoint: &quinn::Endpoint, cert_pem: &str) -> ClientSession {
    let config = common::client_config(endpoint.local_addr().unwrap());
    let crypto = tls::client_crypto(Some(cert_pem.as_bytes()), DEFAULT_ALPN).unwrap();
    ClientSession::connect(&config, crypto).await.unwrap()
}

fn close_code(error: quinn::ConnectionError) -> Option<CloseCode> {
    match error {
        quinn::ConnectionError::ApplicationClosed(close) => CloseCode::from_varint(close.error_code),
        _ => None,
    }
}

#[tokio::test]
async fn lines_reach_the_listener() {
    let mut server = common::start_server(5, false).await;
    let client = common::spawn_session(server.connect().await);

    client.send("hello").await;
    assert_eq!(server.next_text().await, "hello");
    client.send("second line").await;
    assert_eq!(server.next_text().await, "second line");

    client.send("exit").await;
    assert_eq!(client.finish().await.unwrap(), SessionEnd::Exited);
    assert!(common::eventually(Duration::from_secs(2), || server.admission.held() == 0).await);
}

#[tokio::test]
async fn echo_comes_back_to_the_client() {
    let mut server = common::start_server(5, true).await;
    let mut client = common::spawn_session(server.connect().await);

    client.send("ping").await;
    assert_eq!(server.next_text().await, "ping");
    let echoed = common::within(2, client.received.recv()).await.unwrap();
    assert_eq!(echoed.text, "ping");

    client.send("exit").await;
    assert_eq!(client.finish().await.unwrap(), SessionEnd::Exited);
}

#[tokio::test]
async fn user_text_matching_the_notice_is_not_a_rejection() {
    let mut server = common::start_server(5, true).await;
    let mut client = common::spawn_session(server.connect().await);

    client.send(REJECTION_NOTICE).await;
    assert_eq!(server.next_text().await, REJECTION_NOTICE);
    let echoed = common::within(2, client.received.recv()).await.unwrap();
    assert_eq!(echoed.text, REJECTION_NOTICE);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!client.task.is_finished());
    assert_eq!(server.admission.held(), 1);

    client.send("exit").await;
    assert_eq!(client.finish().await.unwrap(), SessionEnd::Exited);
}

#[tokio::test]
async fn exit_sends_notice_then_closes_with_exit_code() {
    let (endpoint, cert_pem) = scripted_peer();
    let peer = tokio::spawn({
        let endpoint = endpoint.clone();
        async move {
            let connection = endpoint.accept().await.unwrap().await.unwrap();
            let (_send, mut recv) = connection.accept_bi().await.unwrap();
            let mut messages = Vec::new();
            let mut buf = [0u8; 1024];
            while let Ok(Some(n)) = recv.read(&mut buf).await {
                for message in Message::decode(&buf[..n]) {
                    messages.push(message.unwrap());
                }
            }
            (messages, connection.closed().await)
        }
    });

    let client = common::spawn_session(dial(&endpoint, &cert_pem).await);
    client.send("hi").await;
    client.send("exit").await;
    assert_eq!(client.finish().await.unwrap(), SessionEnd::Exited);

    let (messages, error) = common::within(5, peer).await.unwrap();
    assert_eq!(
        messages,
        vec![Message::text("hi"), Message::Control(Control::Exit)]
    );
    assert_eq!(close_code(error), Some(CloseCode::ClientExit));
}

#[tokio::test]
async fn failed_exit_notice_is_a_write_error() {
    let (endpoint, cert_pem) = scripted_peer();
    let (stopped_tx, stopped_rx) = tokio::sync::oneshot::channel();
    let peer = tokio::spawn({
        let endpoint = endpoint.clone();
        async move {
            let connection = endpoint.accept().await.unwrap().await.unwrap();
            let (_send, mut recv) = connection.accept_bi().await.unwrap();
            let mut buf = [0u8; 64];
            recv.read(&mut buf).await.unwrap();
            recv.stop(0u32.into()).unwrap();
            let _ = stopped_tx.send(());
            connection.closed().await
        }
    });

    let client = common::spawn_session(dial(&endpoint, &cert_pem).await);
    client.send("hi").await;
    common::within(2, stopped_rx).await.unwrap();
    // Let STOP_SENDING reach the client before it writes again.
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.send("exit").await;

    assert!(matches!(
        client.finish().await,
        Err(quic_messenger::client::ClientError::Write(_))
    ));
    let error = common::within(5, peer).await.unwrap();
    assert_eq!(close_code(error), Some(CloseCode::ClientExit));
}

#[tokio::test]
async fn rejection_notice_is_acknowledged() {
    let (endpoint, cert_pem) = scripted_peer();
    let peer = tokio::spawn({
        let endpoint = endpoint.clone();
        async move {
            let connection = endpoint.accept().await.unwrap().await.unwrap();
            let mut send = connection.open_uni().await.unwrap();
            send.write_all(&Message::rejection().encode()).await.unwrap();
            send.finish().unwrap();
            // Unlike the listener, never close; wait for the client to do it.
            connection.closed().await
        }
    });

    let client = common::spawn_session(dial(&endpoint, &cert_pem).await);
    assert_eq!(client.finish().await.unwrap(), SessionEnd::Rejected);

    let error = common::within(5, peer).await.unwrap();
    assert_eq!(close_code(error), Some(CloseCode::RejectAck));
}

#[tokio::test]
async fn pool_full_close_without_notice_counts_as_rejection() {
    let (endpoint, cert_pem) = scripted_peer();
    let peer = tokio::spawn({
        let endpoint = endpoint.clone();
        async move {
            let connection = endpoint.accept().await.unwrap().await.unwrap();
            // Let the client finish opening its stream first.
            tokio::time::sleep(Duration::from_millis(100)).await;
            CloseCode::PoolFull.close(&connection);
            endpoint.wait_idle().await;
        }
    });

    let client = common::spawn_session(dial(&endpoint, &cert_pem).await);
    assert_eq!(client.finish().await.unwrap(), SessionEnd::Rejected);
    common::within(5, peer).await.unwrap();
}

#[tokio::test]
async fn closed_line_source_ends_like_exit() {
    let mut server = common::start_server(5, false).await;
    let client = common::spawn_session(server.connect().await);

    client.send("last words").await;
    assert_eq!(server.next_text().await, "last words");

    let common::RunningClient { lines, task, .. } = client;
    drop(lines);
    let outcome = common::within(5, task).await.unwrap();
    assert_eq!(outcome.unwrap(), SessionEnd::Exited);
}
