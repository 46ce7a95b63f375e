//! Tracing subscriber and optional OTLP span export.

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// Configures:
/// - An [`EnvFilter`] taken from `RUST_LOG`, falling back to `log_level`.
/// - A JSON-formatted [`tracing_subscriber`] layer for structured log output.
/// - When `otlp_endpoint` is set, a [`tracing_opentelemetry`] layer exporting
///   spans over OTLP/gRPC.
///
/// # Errors
///
/// Returns an error if the OTLP pipeline or the subscriber cannot be installed.
pub fn init_telemetry(service_name: &str, otlp_endpoint: Option<&str>, log_level: &str) -> Result<()> {
    let otel_layer = match otlp_endpoint {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    opentelemetry_sdk::trace::Config::default()
                        .with_resource(service_resource(service_name)),
                )
                .install_batch(runtime::Tokio)
                .context("failed to install OTLP tracing pipeline")?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(otel_layer)
        .try_init()
        .context("failed to initialise tracing subscriber")?;

    Ok(())
}

/// Flush buffered spans before exit.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

fn service_resource(service_name: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            service_name.to_owned(),
        ),
        KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
            env!("CARGO_PKG_VERSION"),
        ),
    ])
}
