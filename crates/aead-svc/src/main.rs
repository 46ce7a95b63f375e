//! `aead-svc`: field-keyed authenticated encryption service.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Open the config store and build the shared [`AppState`].
//! 4. Build the Axum router and serve it, over TLS when configured.

mod config;
mod crypto;
mod engine;
mod error;
mod keyset;
mod lifecycle;
mod resolver;
mod server;
mod store;
mod telemetry;

#[cfg(test)]
mod test_vectors;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use server::state::AppState;
use store::{ConfigStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(
        &cfg.service_name,
        cfg.otel_exporter_otlp_endpoint.as_deref(),
        &cfg.log_level,
    )?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        tls = cfg.tls_paths().is_some(),
        reveal_enabled = cfg.reveal_enabled,
        "aead-svc starting"
    );

    // -----------------------------------------------------------------------
    // 3. Store and state
    // -----------------------------------------------------------------------
    let store = ConfigStore::new(Arc::new(MemoryStore::new()), cfg.store_timeout());
    let state = AppState::new(
        store,
        cfg.failure_policy()?,
        cfg.reveal_enabled,
        cfg.service_name.clone(),
    );

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(state);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let served = match cfg.tls_paths() {
        Some((cert, key)) => {
            let tls = server::tls::load_server_config(&cert, &key)?;
            info!(addr = %addr, "listening (https)");
            server::tls::serve(listener, router, tls).await
        }
        None => {
            info!(addr = %addr, "listening (http)");
            axum::serve(listener, router).await.context("server error")
        }
    };

    telemetry::shutdown();
    served
}
