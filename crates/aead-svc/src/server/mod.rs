//! Axum HTTP(S) transport for the operation catalogue.
//!
//! # Responsibilities
//! - Define the Axum router with one route per operation and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Terminate TLS with rustls when a certificate is configured.

pub mod handlers;
pub mod router;
pub mod state;
pub mod tls;
