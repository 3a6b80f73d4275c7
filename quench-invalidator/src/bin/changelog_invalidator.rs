//! Change-Log Invalidator Service Entry Point
//!
//! Connects to the cache store and the durable change log (with bounded
//! retries), then tails the log until a shutdown signal. Exits non-zero if
//! the initial connection cannot be established or the consume loop dies.

use quench_invalidator::transport::ChangeLogConnector;
use quench_invalidator::{change_log_task, establish, ChangeLogConfig};
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
    tracing::info!("Starting change-log invalidator service");

    let store_config = RedisConfig::from_env();
    let store = match RedisStore::connect(&store_config).await {
        Ok(store) => Arc::new(store),
        Err(error) => {
            tracing::error!(%error, "Failed to connect to cache store");
            std::process::exit(1);
        }
    };

    let config = ChangeLogConfig::from_env();
    let connector = ChangeLogConnector::new(config.clone());
    let feed = match establish(&connector, &config.retry).await {
        Ok(feed) => feed,
        Err(error) => {
            tracing::error!(%error, "Failed to connect after maximum retries, exiting");
            std::process::exit(1);
        }
    };

    tracing::info!(topic = %config.topic, group = %config.group, "Listening for change events");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task = tokio::spawn(change_log_task(store, feed, shutdown_rx));

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
