//! TLS configuration and certificate loading.
//!
//! Covers both directions: the inbound listener (via axum-server) and client
//! configs used when dialing TLS backends.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use axum_server::tls_rustls::RustlsConfig;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;

use crate::config::BackendCertConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no private key found in {0}")]
    MissingKey(String),

    #[error("no certificates found in {0}")]
    MissingCert(String),

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Load TLS configuration for the listener from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

fn open(path: &str) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read { path: path.to_string(), source })
}

/// Read every certificate in a PEM file.
pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read { path: path.to_string(), source })?;
    if certs.is_empty() {
        return Err(TlsError::MissingCert(path.to_string()));
    }
    Ok(certs)
}

/// Read the first private key in a PEM file.
pub fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read { path: path.to_string(), source })?
        .ok_or_else(|| TlsError::MissingKey(path.to_string()))
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Install ring as the process-wide provider. The listener's config builder
/// relies on it when several providers are compiled in.
pub fn install_crypto_provider() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}

/// Build the client config used to reach a TLS backend.
///
/// With a client certificate the server is verified against the webpki roots and
/// the certificate is presented. Without one, server verification is skipped.
pub fn backend_client_config(cert: Option<&BackendCertConfig>) -> Result<Arc<ClientConfig>, TlsError> {
    let builder = ClientConfig::builder_with_provider(provider()).with_safe_default_protocol_versions()?;

    let config = match cert {
        Some(cert) => {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder
                .with_root_certificates(roots)
                .with_client_auth_cert(load_certs(&cert.cert_path)?, load_private_key(&cert.key_path)?)?
        }
        None => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider())))
            .with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

/// Resolve the SNI name: explicit override, else the host part of `host`.
pub fn server_name(override_name: Option<&str>, host: &str) -> Option<ServerName<'static>> {
    let name = match override_name {
        Some(name) if !name.is_empty() => name,
        _ => strip_port(host),
    };
    ServerName::try_from(name.to_string()).ok()
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host
            .find(']')
            .map(|end| &host[1..end])
            .unwrap_or(host);
    }
    match host.rfind(':') {
        Some(idx) if host[idx + 1..].chars().all(|c| c.is_ascii_digit()) => &host[..idx],
        _ => host,
    }
}

#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
