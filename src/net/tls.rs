//! TLS configuration and certificate loading.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

/// Error type for loading the TLS key pair.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no PEM certificate found in {}", .0.display())]
    NoCertificate(PathBuf),

    #[error("no PEM private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("invalid key pair: {0}")]
    KeyPair(#[source] std::io::Error),
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Load TLS configuration from a PEM certificate chain and private key.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let cert = read(cert_path)?;
    let key = read(key_path)?;

    // Checked up front for a clearer message than rustls gives.
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| TlsError::NoCertificate(cert_path.to_path_buf()))?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(cert_path.to_path_buf()));
    }
    match rustls_pemfile::private_key(&mut BufReader::new(key.as_slice())) {
        Ok(Some(_)) => {}
        _ => return Err(TlsError::NoPrivateKey(key_path.to_path_buf())),
    }

    RustlsConfig::from_pem(cert, key).await.map_err(TlsError::KeyPair)
}
