//! Quench Gateway Server Entry Point
//!
//! Bootstraps configuration, connects the cache store and the source
//! pool, and starts the Axum HTTP server.

use std::sync::Arc;

use quench_gateway::{
    api_router, ApiError, ApiResult, AppState, DbConfig, GatewayConfig, PgSource,
    ReadThroughGateway,
};
use quench_store::{RedisConfig, RedisStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db_config = DbConfig::from_env();
    let source = Arc::new(
        PgSource::from_config(&db_config)
            .map_err(|e| ApiError::service_unavailable(e.to_string()))?,
    );

    let redis_config = RedisConfig::from_env();
    let store = Arc::new(
        RedisStore::connect(&redis_config)
            .await
            .map_err(|e| ApiError::service_unavailable(e.to_string()))?,
    );

    let state = Arc::new(AppState {
        gateway: ReadThroughGateway::new(store, source),
    });
    let app = api_router(state);

    let config = GatewayConfig::from_env();
    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting Quench gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
