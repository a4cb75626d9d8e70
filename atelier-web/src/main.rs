use atelier_web::config::env::EnvResolver;
use atelier_web::config::get_configuration;
use atelier_web::services::metrics::init_metrics;
use atelier_web::startup::Application;
use dotenvy::dotenv;
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "atelier-web",
        &configuration.server.log_level,
        configuration.server.otlp_endpoint.as_deref(),
    );
    init_metrics();

    let resolver = EnvResolver::from_process();
    for entry in resolver.report() {
        if !entry.present {
            tracing::warn!(key = entry.key, "Environment variable not set");
        }
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        debug_routes = configuration.debug_routes,
        "Starting atelier-web"
    );

    let application = Application::build(configuration, resolver, None).await?;
    application.run_until_stopped().await?;

    Ok(())
}
