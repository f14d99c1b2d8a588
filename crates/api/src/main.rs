use anyhow::Context;

use scribe_api::{app, config::AppConfig};
use scribe_infra::jobs::Sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    scribe_observability::init();

    let services = app::build_services(&config).context("failed to wire services")?;
    let sweeper = Sweeper::new(config.job_retention, config.sweep_interval)
        .spawn(services.registry().clone());

    let router = app::build_app(services, &config.root_path);
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        root_path = %config.root_path,
        "listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
