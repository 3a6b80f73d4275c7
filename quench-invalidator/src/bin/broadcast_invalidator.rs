//! Broadcast Invalidator Service Entry Point
//!
//! Connects to the cache store and subscribes to the purge exchange (with
//! bounded retries), then consumes until a shutdown signal. Exits non-zero
//! if the initial connection cannot be established or the consume loop
//! dies.

use quench_invalidator::transport::BroadcastConnector;
use quench_invalidator::{broadcast_task, establish, BroadcastConfig};
use quench_store::{RedisConfig, RedisStore};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    tracing::info!("Starting broadcast invalidator service");

    let store_config = RedisConfig::from_env();
    let store = match RedisStore::connect(&store_config).await {
        Ok(store) => Arc::new(store),
        Err(error) => {
            tracing::error!(%error, "Failed to connect to cache store");
            std::process::exit(1);
        }
    };

    let config = BroadcastConfig::from_env();
    let connector = BroadcastConnector::new(config.clone());
    let feed = match establish(&connector, &config.retry).await {
        Ok(feed) => feed,
        Err(error) => {
            tracing::error!(%error, "Failed to connect after maximum retries, exiting");
            std::process::exit(1);
        }
    };

    tracing::info!(exchange = %config.exchange, "Waiting for purge commands");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task = tokio::spawn(broadcast_task(store, feed, shutdown_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            if let Err(error) = (&mut task).await {
                tracing::error!(%error, "Invalidator task failed");
                std::process::exit(1);
            }
        }
        _ = &mut task => {
            // No reconnection exists after startup; the orchestrator
            // restarts the process.
            tracing::error!("Consume loop ended unexpectedly, exiting");
            std::process::exit(1);
        }
    }
}
