use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_lifecycle::api::{self, AppState};
use order_lifecycle::app;
use order_lifecycle::config::Config;
use order_lifecycle::lifecycle::Lifecycle;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=order_lifecycle=trace
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order lifecycle service");

    // === 1. Load configuration ===
    let config = Config::from_env()?;
    tracing::info!(
        roles = ?config.roles,
        store = ?config.store_backend,
        broker = ?config.broker.backend,
        "⚙️  Configuration loaded"
    );

    let lifecycle = Lifecycle::new();

    // === 2. Connect dependencies (bounded retry each) ===
    let components = app::connect(&config, &lifecycle).await?;

    // === 3. Start consumer roles ===
    let orders = app::start_roles(&config, &components, &lifecycle).await?;

    // === 4. HTTP API ===
    let state = AppState {
        orders,
        metrics: components.metrics.clone(),
        health: components.health.clone(),
    };
    let server = api::serve(
        state,
        &config.http_addr,
        lifecycle.shutdown_signal(),
        config.shutdown_timeout,
    )?;
    let server = actix_web::rt::spawn(server);

    tracing::info!("✅ All roles running. Press Ctrl+C to stop.");

    // === 5. Wait for shutdown ===
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C");

    let result = lifecycle.shutdown(config.shutdown_timeout).await;

    match server.await {
        Ok(Ok(())) => tracing::info!("HTTP API stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP API failed"),
        Err(e) => tracing::error!(error = %e, "HTTP API task panicked"),
    }

    result?;
    tracing::info!("👋 Shutdown complete");
    Ok(())
}
