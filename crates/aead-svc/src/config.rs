//! Configuration loading and validation for the service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::FailurePolicy;

/// Validated service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP(S) server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// PEM certificate chain. Must be set together with `tls_key_path`.
    #[serde(default)]
    pub tls_cert_path: Option<String>,

    /// PEM private key. Must be set together with `tls_cert_path`.
    #[serde(default)]
    pub tls_key_path: Option<String>,

    /// OTLP gRPC endpoint. Span export is disabled when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deadline (milliseconds) for each store access and lock acquisition.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Default crypto batch policy: `fail-fast` or `best-effort`.
    #[serde(default = "default_batch_failure_policy")]
    pub batch_failure_policy: String,

    /// Whether `reveal-key` may return unmasked keysets.
    #[serde(default)]
    pub reveal_enabled: bool,

    /// Name reported by `read-info` and attached to exported spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_listen_port() -> u16 {
    8200
}
fn default_log_level() -> String {
    "info".into()
}
fn default_store_timeout_ms() -> u64 {
    5000
}
fn default_batch_failure_policy() -> String {
    "fail-fast".into()
}
fn default_service_name() -> String {
    "aead-svc".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.store_timeout_ms == 0 {
            anyhow::bail!("STORE_TIMEOUT_MS must be > 0");
        }
        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            anyhow::bail!("TLS_CERT_PATH and TLS_KEY_PATH must be set together");
        }
        if let Some(path) = &self.tls_cert_path {
            ensure_non_empty(path, "TLS_CERT_PATH")?;
        }
        if let Some(path) = &self.tls_key_path {
            ensure_non_empty(path, "TLS_KEY_PATH")?;
        }
        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            ensure_non_empty(endpoint, "OTEL_EXPORTER_OTLP_ENDPOINT")?;
        }
        ensure_non_empty(&self.service_name, "SERVICE_NAME")?;
        self.failure_policy()?;
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn failure_policy(&self) -> Result<FailurePolicy> {
        self.batch_failure_policy
            .parse()
            .map_err(|e: String| anyhow::anyhow!("BATCH_FAILURE_POLICY: {e}"))
    }

    /// Certificate and key paths when TLS is configured.
    pub fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            _ => None,
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} must not be empty");
    }
    Ok(())
}
