use billing_core::observability::init_tracing;
use billing_desk::config::get_configuration;
use billing_desk::startup::Application;
use dotenvy::dotenv;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "billing-desk",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    )?;

    billing_desk::services::metrics::init_metrics();

    let application = Application::build(configuration).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Failed to build application: {}", e)
    })?;

    info!("Starting billing-desk on port {}", application.port());
    application.run_until_stopped().await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
