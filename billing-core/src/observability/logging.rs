use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to initialize OTLP tracer: {0}")]
    Tracer(#[from] opentelemetry::trace::TraceError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber: env filter, JSON logs with file/line, and
/// an OTLP exporter when `otlp_endpoint` is set.
///
/// `RUST_LOG` overrides `log_level`.
pub fn init_tracing(
    service_name: &str,
    log_level: &str,
    otlp_endpoint: Option<&str>,
) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let telemetry = match otlp_endpoint {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name.to_string()),
                ])))
                .install_batch(runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .try_init()?;

    tracing::info!(
        service = service_name,
        otlp = otlp_endpoint.unwrap_or("disabled"),
        "Tracing initialized"
    );

    Ok(())
}
