//! TLS acceptor construction for the in-process engine.

use crate::config::TlsConfig;
use crate::error::EngineError;
use rustls::pki_types::CertificateDer;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Create TLS acceptor from certificate and key files.
pub fn create_tls_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, EngineError> {
    let cert_path = tls.cert_path.as_str();
    let key_path = tls.key_path.as_str();

    // Load certificate chain
    let cert_file = std::fs::File::open(cert_path)
        .map_err(|e| EngineError::Tls(format!("Failed to open certificate file '{cert_path}': {e}")))?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| EngineError::Tls(format!("Failed to parse certificate file: {e}")))?;

    if certs.is_empty() {
        return Err(EngineError::Tls(format!(
            "No certificates found in certificate file: {cert_path}"
        )));
    }

    let key_file = std::fs::File::open(key_path)
        .map_err(|e| EngineError::Tls(format!("Failed to open private key file '{key_path}': {e}")))?;
    let mut key_reader = std::io::BufReader::new(key_file);

    // PKCS8, RSA or EC
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| EngineError::Tls(format!("Failed to parse private key file: {e}")))?
        .ok_or_else(|| EngineError::Tls(format!("No private key found in key file: {key_path}")))?;

    // Pin the ring provider; other rustls users in the process may enable aws-lc-rs.
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| EngineError::Tls(format!("Failed to select protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| EngineError::Tls(format!("Failed to build TLS configuration: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
