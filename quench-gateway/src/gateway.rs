//! Read-Through Cache Gateway
//!
//! Cache first, source on miss, repopulate, return. The gateway tolerates a
//! cache store outage by serving straight from the source (degraded but
//! available); a source outage fails the request.
//!
//! There is an inherent race: between a source write and its invalidation
//! arriving, a concurrent miss can re-cache stale data. The next
//! invalidation signal from either channel clears it; the system favors
//! eventual consistency with bounded staleness.

use quench_core::{User, PRIMARY_COLLECTION_KEY};
use quench_store::CacheStore;
use std::sync::Arc;
use thiserror::Error;

use crate::source::{CollectionSource, SourceError};

// ============================================================================
// ERRORS
// ============================================================================

/// Gateway read errors. Store failures never appear here: they degrade.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("collection serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// COLLECTION READ
// ============================================================================

/// A collection read with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRead {
    pub users: Vec<User>,
    /// Whether the read was served from the cache.
    pub from_cache: bool,
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Read-through cache gateway over an injected store and source.
#[derive(Clone)]
pub struct ReadThroughGateway<S, D> {
    store: Arc<S>,
    source: Arc<D>,
}

impl<S, D> ReadThroughGateway<S, D>
where
    S: CacheStore,
    D: CollectionSource,
{
    pub fn new(store: Arc<S>, source: Arc<D>) -> Self {
        Self { store, source }
    }

    /// Serve the collection, preferring the cache.
    ///
    /// On a miss this performs exactly one source query and one cache
    /// populate. A cached payload that no longer deserializes is treated
    /// as a miss and overwritten by the repopulation.
    pub async fn get_collection(&self) -> Result<CollectionRead, GatewayError> {
        match self.store.get(PRIMARY_COLLECTION_KEY).await {
            Ok(Some(payload)) => match serde_json::from_slice::<Vec<User>>(&payload) {
                Ok(users) => {
                    tracing::debug!(key = PRIMARY_COLLECTION_KEY, "Cache hit");
                    return Ok(CollectionRead {
                        users,
                        from_cache: true,
                    });
                }
                Err(error) => {
                    tracing::warn!(%error, "Cached payload no longer deserializes, treating as miss");
                }
            },
            Ok(None) => {
                tracing::debug!(key = PRIMARY_COLLECTION_KEY, "Cache miss");
            }
            Err(error) => {
                tracing::warn!(%error, "Cache store unreachable, serving from source");
            }
        }

        let users = self.source.fetch_all().await?;
        let payload = serde_json::to_vec(&users)?;

        if let Err(error) = self.store.set(PRIMARY_COLLECTION_KEY, &payload).await {
            // Stale-read window until the next successful populate; the
            // request itself still succeeds.
            tracing::warn!(%error, "Failed to repopulate cache");
        }

        Ok(CollectionRead {
            users,
            from_cache: false,
        })
    }
}
