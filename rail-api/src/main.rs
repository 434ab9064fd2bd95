use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rail_api::{app, worker, AppState, AuthConfig};
use rail_catalog::{bootstrap, bootstrap_catalog};
use rail_order::{ExpiryReaper, MockPaymentGateway};
use rail_store::{app_config::Config, DbClient, Stores};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rail_api=debug,rail_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Rail API on port {}", config.server.port);

    // Storage
    let stores = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections).await?;
            db.migrate().await?;
            Stores::postgres(&db)
        }
        None => {
            tracing::warn!("No database.url configured, using the in-memory store");
            Stores::memory()
        }
    };

    if config.seed.enabled {
        bootstrap(stores.seeder.as_ref(), &bootstrap_catalog()).await?;
    }

    // Expiry worker
    let reaper = Arc::new(ExpiryReaper::new(
        stores.orders.clone(),
        chrono::Duration::minutes(config.reservations.pending_ttl_minutes),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = worker::start_expiry_worker(
        reaper,
        Duration::from_secs(config.reservations.sweep_interval_seconds),
        shutdown_rx,
    );

    let app_state = AppState::new(
        &stores,
        Arc::new(MockPaymentGateway),
        AuthConfig { secret: config.auth.jwt_secret.clone() },
        &config.payments,
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    reaper_handle.await?;
    tracing::info!("Rail API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
