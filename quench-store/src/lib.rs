//! Quench Store - Cache Store Trait and Implementations
//!
//! Defines the key-value contract the gateway and both invalidators share,
//! the Redis adapter used in production, and an in-memory implementation
//! used by isolated tests.
//!
//! The contract is deliberately minimal: no locking or versioning is
//! exposed, and all cross-process consistency is achieved by callers
//! treating `delete` as the sole invalidation action.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis_store;

pub use memory::{InMemoryStore, StatsSnapshot};
pub use redis_store::{RedisConfig, RedisStore};

// ============================================================================
// ERRORS
// ============================================================================

/// Cache store errors, surfaced to the caller who decides whether to retry
/// or degrade.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("cache store unreachable: {0}")]
    Unavailable(String),

    /// The store was reachable but the operation failed.
    #[error("cache store operation failed: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if matches!(err.kind(), redis::ErrorKind::IoError) {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

// ============================================================================
// CACHE STORE TRAIT
// ============================================================================

/// Key-value interface over opaque serialized payloads.
///
/// Implementations provide single-key atomicity and nothing more. Deleting
/// a key that does not exist is a no-op success, never an error; that is
/// what makes invalidation idempotent across the three independent writers
/// of the cache key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the payload stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `payload` under `key`, replacing any previous value.
    async fn set(&self, key: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// Remove the entry under `key`. Absent keys are a no-op success.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
