//! HTTP Routes for the Gateway
//!
//! Thin Axum surface over [`ReadThroughGateway`]: a liveness root, the
//! collection read, and a health probe.

use axum::{extract::State, routing::get, Json, Router};
use quench_core::User;
use quench_store::CacheStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::gateway::ReadThroughGateway;
use crate::source::CollectionSource;

/// Shared handler state.
pub struct AppState<S, D> {
    pub gateway: ReadThroughGateway<S, D>,
}

/// Build the API router.
pub fn api_router<S, D>(state: Arc<AppState<S, D>>) -> Router
where
    S: CacheStore + 'static,
    D: CollectionSource + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/users", get(list_users::<S, D>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"message": "API running"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_users<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
) -> Result<Json<Vec<User>>, ApiError>
where
    S: CacheStore + 'static,
    D: CollectionSource + 'static,
{
    let read = state.gateway.get_collection().await?;
    Ok(Json(read.users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FixedSource;
    use quench_store::InMemoryStore;

    #[tokio::test]
    async fn test_router_builds() {
        let store = Arc::new(InMemoryStore::new());
        let source = Arc::new(FixedSource::new(Vec::new()));
        let state = Arc::new(AppState {
            gateway: ReadThroughGateway::new(store, source),
        });
        let _router = api_router(state);
    }
}
