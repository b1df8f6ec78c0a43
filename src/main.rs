use anyhow::Context;
use dotenv::dotenv;
use tracing::info;

use sso_backend::{
    app::create_router,
    app_state::AppState,
    config, db,
    telemetry::{init_telemetry, TelemetryConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = config::init().context("Failed to load configuration")?;
    let telemetry = init_telemetry(TelemetryConfig::from_app(&config.app)).await?;

    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    tokio::fs::create_dir_all(&config.uploads.dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.uploads.dir.display()))?;

    let app = create_router(AppState::new(pool, config));

    let addr = config.server_addr();
    info!(
        production = config.is_production(),
        "{} listening on {}", config.app.name, addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to serve application")?;

    telemetry.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
