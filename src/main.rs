mod api;
mod auth;
mod clock;
mod config;
mod context;
mod db;
mod error;
mod media;
mod models;
mod push;
mod service;
mod sweep;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;

use config::AppConfig;
use context::AppContext;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting UltraCare API...");

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    db::migrate(&pool).await?;
    info!("Connected to database");

    let bind = SocketAddr::from(([0, 0, 0, 0], config.port));
    let ctx = AppContext::from_config(config, pool)?;

    // Background offline sweep
    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = tokio::spawn(sweep::run(ctx.clone(), stop_rx));

    api::serve(ctx, bind, shutdown_signal()).await?;

    let _ = stop_tx.send(true);
    if let Err(e) = sweeper.await {
        error!("Offline sweep task ended abnormally: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
