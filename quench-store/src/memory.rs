//! In-memory cache store for isolated tests.
//!
//! Mirrors the production contract exactly, including delete-of-absent
//! being a no-op success, and counts operations so tests can assert how
//! the cache was touched.

use crate::{CacheStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory cache store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

/// Operation counters observed since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.inner.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the operation counters.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.inner.gets.load(Ordering::Relaxed),
            sets: self.inner.sets.load(Ordering::Relaxed),
            deletes: self.inner.deletes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.gets.fetch_add(1, Ordering::Relaxed);
        let entries = self.inner.entries.read().unwrap();
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        self.inner.sets.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.inner.entries.write().unwrap();
        entries.insert(key.to_string(), payload.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.inner.entries.write().unwrap();
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = InMemoryStore::new();
        store.set("k", b"payload").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"payload"[..]));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_absent_is_none_not_error() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::new();
        store.set("k", b"payload").await.unwrap();

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        // Second delete of the now-absent key: identical observable effect.
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.stats().deletes, 2);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = InMemoryStore::new();
        store.set("k", b"old").await.unwrap();
        store.set("k", b"new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some(&b"new"[..]));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_count_operations() {
        let store = InMemoryStore::new();
        store.set("a", b"1").await.unwrap();
        store.get("a").await.unwrap();
        store.get("b").await.unwrap();
        store.delete("a").await.unwrap();

        let stats = store.stats();
        assert_eq!(
            stats,
            StatsSnapshot {
                gets: 2,
                sets: 1,
                deletes: 1
            }
        );
    }
}
