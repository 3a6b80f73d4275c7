//! Change-Log Invalidator Task
//!
//! Tails the durable change log and deletes the primary collection key for
//! every row mutation classified as create/update/delete. Everything else
//! (snapshot markers, unknown codes, undecodable bodies) is ignored.
//!
//! Delete failures are logged and swallowed: the next event gets another
//! chance, and a store outage degrades to temporarily stale reads rather
//! than stopping consumption. The loop ends on the shutdown signal, when
//! the feed ends, or on a feed transport error; it never ends because of a
//! single bad event.

use quench_core::{ChangeEvent, PRIMARY_COLLECTION_KEY};
use quench_store::CacheStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::bootstrap::RetryPolicy;
use crate::transport::EventFeed;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the change-log invalidator.
#[derive(Debug, Clone)]
pub struct ChangeLogConfig {
    /// Durable-log bootstrap address.
    pub addr: String,
    /// Topic carrying row-mutation events for the cached collection.
    pub topic: String,
    /// Consumer group whose committed position this invalidator advances.
    pub group: String,
    /// Startup connection retry budget.
    pub retry: RetryPolicy,
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            addr: "redis://redis:6379".to_string(),
            topic: "cdc.public.users".to_string(),
            group: "cache-invalidator".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ChangeLogConfig {
    /// Create a change-log configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUENCH_LOG_ADDR`: Durable-log address (default: "redis://redis:6379")
    /// - `QUENCH_LOG_TOPIC`: Topic name (default: "cdc.public.users")
    /// - `QUENCH_LOG_GROUP`: Consumer group (default: "cache-invalidator")
    /// - `QUENCH_CONNECT_MAX_RETRIES` / `QUENCH_CONNECT_BACKOFF_SECS`: see
    ///   [`RetryPolicy::from_env`]
    pub fn from_env() -> Self {
        Self {
            addr: std::env::var("QUENCH_LOG_ADDR")
                .unwrap_or_else(|_| "redis://redis:6379".to_string()),
            topic: std::env::var("QUENCH_LOG_TOPIC")
                .unwrap_or_else(|_| "cdc.public.users".to_string()),
            group: std::env::var("QUENCH_LOG_GROUP")
                .unwrap_or_else(|_| "cache-invalidator".to_string()),
            retry: RetryPolicy::from_env(),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for change-log consumption.
#[derive(Debug, Default)]
pub struct ChangeLogMetrics {
    /// Events delivered from the feed.
    pub events_seen: AtomicU64,
    /// Events that triggered a cache delete.
    pub invalidations: AtomicU64,
    /// Events classified as non-invalidating.
    pub ignored: AtomicU64,
    /// Cache deletes that failed (logged and swallowed).
    pub delete_errors: AtomicU64,
}

impl ChangeLogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> ChangeLogSnapshot {
        ChangeLogSnapshot {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            delete_errors: self.delete_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`ChangeLogMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeLogSnapshot {
    pub events_seen: u64,
    pub invalidations: u64,
    pub ignored: u64,
    pub delete_errors: u64,
}

// ============================================================================
// CONSUME LOOP
// ============================================================================

/// Run the change-log invalidator until shutdown or feed end.
///
/// One event is processed fully before the next is awaited; the feed wait
/// is the sole suspension point besides the shutdown signal. Returns the
/// task's metrics for the caller to log or assert on.
pub async fn change_log_task<S, F>(
    store: Arc<S>,
    mut feed: F,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ChangeLogMetrics>
where
    S: CacheStore,
    F: EventFeed,
{
    let metrics = Arc::new(ChangeLogMetrics::new());

    tracing::info!("Change-log invalidator started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Change-log invalidator shutting down");
                    break;
                }
            }

            event = feed.next_event() => {
                match event {
                    Ok(Some(body)) => handle_event(store.as_ref(), &body, &metrics).await,
                    Ok(None) => {
                        tracing::info!("Change feed ended");
                        break;
                    }
                    Err(error) => {
                        tracing::error!(%error, "Change feed failed");
                        break;
                    }
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        events_seen = snapshot.events_seen,
        invalidations = snapshot.invalidations,
        ignored = snapshot.ignored,
        delete_errors = snapshot.delete_errors,
        "Change-log invalidator stopped"
    );

    metrics
}

/// Classify one event and apply the invalidation effect.
async fn handle_event<S: CacheStore>(store: &S, body: &[u8], metrics: &ChangeLogMetrics) {
    metrics.events_seen.fetch_add(1, Ordering::Relaxed);

    let event = ChangeEvent::decode(body);
    if !event.is_invalidating() {
        metrics.ignored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(op = ?event.operation, "Non-invalidating event ignored");
        return;
    }

    tracing::info!(
        table = event.table.as_deref().unwrap_or("<unknown>"),
        op = ?event.operation,
        "Database change detected, invalidating cache"
    );

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
