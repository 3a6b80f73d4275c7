//! Broadcast Invalidator Task
//!
//! Consumes administrative purge commands from the fanout exchange. The
//! message content is never interpreted: arrival alone deletes the primary
//! collection key. Messages are acknowledged implicitly at delivery and
//! never redelivered, so a delete failure is logged and swallowed; the
//! next purge (or the change-log channel) covers it.

use quench_core::{PurgeSignal, PRIMARY_COLLECTION_KEY};
use quench_store::CacheStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::bootstrap::RetryPolicy;
use crate::transport::PurgeFeed;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the broadcast invalidator.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Broadcast broker address.
    pub addr: String,
    /// Fanout exchange carrying purge commands.
    pub exchange: String,
    /// Startup connection retry budget.
    pub retry: RetryPolicy,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            addr: "redis://redis:6379".to_string(),
            exchange: "cache_purge".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl BroadcastConfig {
    /// Create a broadcast configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUENCH_PURGE_ADDR`: Broker address (default: "redis://redis:6379")
    /// - `QUENCH_PURGE_EXCHANGE`: Exchange name (default: "cache_purge")
    /// - `QUENCH_CONNECT_MAX_RETRIES` / `QUENCH_CONNECT_BACKOFF_SECS`: see
    ///   [`RetryPolicy::from_env`]
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var("QUENCH_PURGE_ADDR")
                .unwrap_or_else(|_| "redis://redis:6379".to_string()),
            exchange: std::env::var("QUENCH_PURGE_EXCHANGE")
                .unwrap_or_else(|_| "cache_purge".to_string()),
            retry: RetryPolicy::from_env(),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for broadcast consumption.
#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    /// Purge commands received.
    pub purges_seen: AtomicU64,
    /// Purges that completed a cache delete.
    pub invalidations: AtomicU64,
    /// Cache deletes that failed (logged and swallowed).
    pub delete_errors: AtomicU64,
}

impl BroadcastMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> BroadcastSnapshot {
        BroadcastSnapshot {
            purges_seen: self.purges_seen.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            delete_errors: self.delete_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`BroadcastMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastSnapshot {
    pub purges_seen: u64,
    pub invalidations: u64,
    pub delete_errors: u64,
}

// ============================================================================
// CONSUME LOOP
// ============================================================================

/// Run the broadcast invalidator until shutdown or subscription end.
///
/// One message is processed fully before the next is awaited. Returns the
/// task's metrics for the caller to log or assert on.
pub async fn broadcast_task<S, F>(
    store: Arc<S>,
    mut feed: F,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<BroadcastMetrics>
where
    S: CacheStore,
    F: PurgeFeed,
{
    let metrics = Arc::new(BroadcastMetrics::new());

    tracing::info!("Broadcast invalidator started, waiting for purge commands");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Broadcast invalidator shutting down");
                    break;
                }
            }

            purge = feed.next_purge() => {
                match purge {
                    Some(signal) => handle_purge(store.as_ref(), &signal, &metrics).await,
                    None => {
                        tracing::info!("Broadcast subscription ended");
                        break;
                    }
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        purges_seen = snapshot.purges_seen,
        invalidations = snapshot.invalidations,
        delete_errors = snapshot.delete_errors,
        "Broadcast invalidator stopped"
    );

    metrics
}

/// Apply one purge command.
async fn handle_purge<S: CacheStore>(store: &S, signal: &PurgeSignal, metrics: &BroadcastMetrics) {
    metrics.purges_seen.fetch_add(1, Ordering::Relaxed);

    tracing::info!(body = %signal.body_text(), "Purge command received, invalidating cache");

    match store.delete(PRIMARY_COLLECTION_KEY).await {
        Ok(()) => {
            metrics.invalidations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = PRIMARY_COLLECTION_KEY, "Cache cleared");
        }
        Err(error) => {
            metrics.delete_errors.fetch_add(1, Ordering::Relaxed);
            tracing::error!(%error, "Failed to clear cache");
        }
    }
}
