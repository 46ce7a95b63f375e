//! TLS termination with rustls.
//!
//! When a certificate and key are configured the service accepts connections
//! itself, completes the rustls handshake and hands each stream to hyper's
//! auto (HTTP/1 + HTTP/2) connection builder.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::debug;

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;
    if certs.is_empty() {
        anyhow::bail!("no certificate found in PEM data");
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .context("failed to read TLS private key")?
        .context("no private key found in PEM data")?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("failed to build rustls ServerConfig")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Read the PEM files at `cert_path` and `key_path`.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let cert = std::fs::read(cert_path)
        .with_context(|| format!("failed to read {}", cert_path.display()))?;
    let key = std::fs::read(key_path)
        .with_context(|| format!("failed to read {}", key_path.display()))?;
    build_server_config(&cert, &key)
}

/// Accept TLS connections on `listener` until an accept error occurs.
pub async fn serve(listener: TcpListener, router: Router, config: Arc<ServerConfig>) -> Result<()> {
    let acceptor = TlsAcceptor::from(config);
    loop {
        let (stream, peer) = listener.accept().await.context("failed to accept connection")?;
        let acceptor = acceptor.clone();
        let router = router.clone();
        tokio::spawn(async move {
            let tls = match acceptor.accept(stream).await {
                Ok(tls) => tls,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };
            let service = hyper::service::service_fn(move |req: hyper::Request<Incoming>| {
                router.clone().oneshot(req)
            });
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls), service)
                .await
            {
                debug!(peer = %peer, error = %e, "connection closed with error");
            }
        });
    }
}
