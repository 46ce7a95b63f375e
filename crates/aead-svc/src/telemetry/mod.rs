//! Structured logging and optional OpenTelemetry span export.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, ciphertext or key material** may appear in any span
//!   attribute or log field. Events carry field names, physical key names,
//!   operation names and key IDs only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown};
