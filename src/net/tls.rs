//! TLS material loading.
//!
//! Server side: optional TLS for the local index/health surface.
//! Client side: per-repository client identities for reachability probes.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::error::{MirrorError, Result};

/// Load TLS configuration from certificate and key files.
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

/// Load a PEM client certificate and private key as a request identity.
///
/// Fails when either file is unreadable, holds no certificate, or holds no
/// private key.
pub fn load_client_identity(repo_id: &str, cert_path: &Path, key_path: &Path) -> Result<reqwest::Identity> {
    let tls_error = |message: String| MirrorError::TlsConfig {
        repo: repo_id.to_string(),
        message,
    };

    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| tls_error(format!("unable to read {}: {}", cert_path.display(), e)))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| tls_error(format!("unable to read {}: {}", key_path.display(), e)))?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(format!("malformed certificate {}: {}", cert_path.display(), e)))?;
    if certs.is_empty() {
        return Err(tls_error(format!("no certificate found in {}", cert_path.display())));
    }
    match rustls_pemfile::private_key(&mut key_pem.as_slice()) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(tls_error(format!("no private key found in {}", key_path.display()))),
        Err(e) => return Err(tls_error(format!("malformed key {}: {}", key_path.display(), e))),
    }

    let mut bundle = cert_pem;
    if !bundle.ends_with(b"\n") {
        bundle.push(b'\n');
    }
    bundle.extend_from_slice(&key_pem);
    reqwest::Identity::from_pem(&bundle).map_err(|e| tls_error(e.to_string()))
}
