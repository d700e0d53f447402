//! TLS configuration and certificate loading for QUIC.
//!
//! Both roles pin the `ring` provider and TLS 1.3, which QUIC requires.

use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use quinn::crypto::rustls::{NoInitialCipherSuite, QuicClientConfig, QuicServerConfig};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;

/// Error type for building TLS contexts.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid PEM data: {0}")]
    Pem(#[source] std::io::Error),
    #[error("no certificates found")]
    NoCertificates,
    #[error("no private key found")]
    NoPrivateKey,
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("TLS configuration unusable for QUIC: {0}")]
    Quic(#[from] NoInitialCipherSuite),
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(TlsError::Pem)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates);
    }
    Ok(certs)
}

fn parse_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(TlsError::Pem)?
        .ok_or(TlsError::NoPrivateKey)
}

/// Build the listener's crypto config from PEM-encoded chain and key.
pub fn server_crypto(
    cert_pem: &[u8],
    key_pem: &[u8],
    alpn: &str,
) -> Result<Arc<QuicServerConfig>, TlsError> {
    let certs = parse_certs(cert_pem)?;
    let key = parse_key(key_pem)?;

    let mut config = rustls::ServerConfig::builder_with_provider(provider())
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];

    Ok(Arc::new(QuicServerConfig::try_from(config)?))
}

/// Load certificate chain and key files, then build the listener's config.
pub fn load_server_crypto(
    cert_path: &Path,
    key_path: &Path,
    alpn: &str,
) -> Result<Arc<QuicServerConfig>, TlsError> {
    tracing::debug!(cert = %cert_path.display(), key = %key_path.display(), "Loading TLS material");
    server_crypto(&read(cert_path)?, &read(key_path)?, alpn)
}

/// Build the dialer's crypto config.
///
/// With `ca_pem` the server must present a certificate chaining to it;
/// without it the server certificate is accepted unverified (the handshake
/// signature is still checked).
pub fn client_crypto(ca_pem: Option<&[u8]>, alpn: &str) -> Result<Arc<QuicClientConfig>, TlsError> {
    let provider = provider();
    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&[&rustls::version::TLS13])?;

    let mut config = match ca_pem {
        Some(pem) => {
            let mut roots = RootCertStore::empty();
            for cert in parse_certs(pem)? {
                roots.add(cert)?;
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
            .with_no_client_auth(),
    };
    config.alpn_protocols = vec![alpn.as_bytes().to_vec()];

    Ok(Arc::new(QuicClientConfig::try_from(config)?))
}

/// Load the optional CA file, then build the dialer's config.
pub fn load_client_crypto(
    ca_path: Option<&Path>,
    alpn: &str,
) -> Result<Arc<QuicClientConfig>, TlsError> {
    match ca_path {
        Some(path) => client_crypto(Some(&read(path)?), alpn),
        None => {
            tracing::warn!("No CA certificate configured; server certificate will not be verified");
            client_crypto(None, alpn)
        }
    }
}

/// Accepts any server certificate.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
