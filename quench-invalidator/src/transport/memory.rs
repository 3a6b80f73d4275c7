//! In-memory transports for isolated tests.
//!
//! [`MemoryLog`] reproduces the durable-log contract: an append-only,
//! replayable event sequence with a committed position per consumer group,
//! starting from the earliest retained event for a group with no prior
//! position, and advancing the position at delivery (commit-after-dispatch).
//!
//! [`MemoryHub`] reproduces the fanout contract over tokio broadcast
//! channels: one channel per exchange, every subscriber sees every message
//! published while subscribed, nothing is replayed.

use async_trait::async_trait;
use quench_core::PurgeSignal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};

use super::{BroadcastHub, EventFeed, FeedError, HubError, PurgeFeed};
use crate::bootstrap::ConnectError;

// ============================================================================
// MEMORY LOG
// ============================================================================

/// Shared in-memory durable log.
#[derive(Clone, Default)]
pub struct MemoryLog {
    inner: Arc<LogInner>,
}

#[derive(Default)]
struct LogInner {
    events: Mutex<Vec<Vec<u8>>>,
    /// Committed read position per consumer group.
    offsets: Mutex<HashMap<String, usize>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the log and wake blocked feeds.
    pub fn append(&self, body: impl Into<Vec<u8>>) {
        self.inner.events.lock().unwrap().push(body.into());
        self.inner.notify.notify_waiters();
    }

    /// Close the log: feeds drain what remains, then end.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Subscribe a consumer group, resuming from its committed position
    /// (the earliest retained event when the group has none).
    pub fn subscribe(&self, group: &str) -> MemoryLogFeed {
        MemoryLogFeed {
            log: self.clone(),
            group: group.to_string(),
        }
    }

    /// Committed position of a consumer group.
    pub fn committed(&self, group: &str) -> usize {
        self.inner
            .offsets
            .lock()
            .unwrap()
            .get(group)
            .copied()
            .unwrap_or(0)
    }
}

/// One consumer group's feed over a [`MemoryLog`].
pub struct MemoryLogFeed {
    log: MemoryLog,
    group: String,
}

impl MemoryLogFeed {
    /// Deliver the next unconsumed event, committing past it.
    fn try_take(&self) -> Option<Vec<u8>> {
        let events = self.log.inner.events.lock().unwrap();
        let mut offsets = self.log.inner.offsets.lock().unwrap();
        let position = offsets.entry(self.group.clone()).or_insert(0);
        if *position < events.len() {
            let body = events[*position].clone();
            *position += 1;
            Some(body)
        } else {
            None
        }
    }
}

#[async_trait]
impl EventFeed for MemoryLogFeed {
    async fn next_event(&mut self) -> Result<Option<Vec<u8>>, FeedError> {
        loop {
            let notified = self.log.inner.notify.notified();
            if let Some(body) = self.try_take() {
                return Ok(Some(body));
            }
            if self.log.inner.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            notified.await;
        }
    }
}

// ============================================================================
// MEMORY HUB
// ============================================================================

const EXCHANGE_CAPACITY: usize = 64;

/// Shared in-memory fanout broadcast hub.
#[derive(Clone, Default)]
pub struct MemoryHub {
    exchanges: Arc<Mutex<HashMap<String, broadcast::Sender<PurgeSignal>>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&self, exchange: &str) -> broadcast::Sender<PurgeSignal> {
        let mut exchanges = self.exchanges.lock().unwrap();
        exchanges
            .entry(exchange.to_string())
            .or_insert_with(|| broadcast::channel(EXCHANGE_CAPACITY).0)
            .clone()
    }

    /// Tear down an exchange: subscribers drain buffered messages, then
    /// their feeds end.
    pub fn close(&self, exchange: &str) {
        self.exchanges.lock().unwrap().remove(exchange);
    }
}

#[async_trait]
impl BroadcastHub for MemoryHub {
    type Feed = MemoryPurgeFeed;

    async fn subscribe(&self, exchange: &str) -> Result<MemoryPurgeFeed, ConnectError> {
        let sender = self.declare(exchange);
        Ok(MemoryPurgeFeed {
            rx: sender.subscribe(),
        })
    }

    async fn publish(&self, exchange: &str, body: &[u8]) -> Result<(), HubError> {
        let sender = self.declare(exchange);
        // A publish with no subscribers is not an error: fanout is
        // fire-and-forget.
        let _ = sender.send(PurgeSignal::new(body));
        Ok(())
    }
}

/// One subscriber's feed over a [`MemoryHub`] exchange.
pub struct MemoryPurgeFeed {
    rx: broadcast::Receiver<PurgeSignal>,
}

#[async_trait]
impl PurgeFeed for MemoryPurgeFeed {
    async fn next_purge(&mut self) -> Option<PurgeSignal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Broadcast subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_delivers_in_order_from_earliest() {
        let log = MemoryLog::new();
        log.append(b"first".to_vec());
        log.append(b"second".to_vec());

        let mut feed = log.subscribe("group-a");
        assert_eq!(feed.next_event().await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(feed.next_event().await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(log.committed("group-a"), 2);
    }

    #[tokio::test]
    async fn test_log_commits_at_delivery_not_effect() {
        let log = MemoryLog::new();
        log.append(b"event".to_vec());

        let mut feed = log.subscribe("group-a");
        let _ = feed.next_event().await.unwrap();
        // The position moved even though no downstream effect happened: a
        // resubscribed group does not see the event again.
        drop(feed);
        log.close();
        let mut feed = log.subscribe("group-a");
        assert_eq!(feed.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_log_close_ends_feed_after_drain() {
        let log = MemoryLog::new();
        log.append(b"last".to_vec());
        log.close();

        let mut feed = log.subscribe("group-a");
        assert_eq!(feed.next_event().await.unwrap(), Some(b"last".to_vec()));
        assert_eq!(feed.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_log_wakes_blocked_feed_on_append() {
        let log = MemoryLog::new();
        let mut feed = log.subscribe("group-a");

        let appender = {
            let log = log.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                log.append(b"late".to_vec());
            })
        };

        assert_eq!(feed.next_event().await.unwrap(), Some(b"late".to_vec()));
        appender.await.unwrap();
    }

    #[tokio::test]
    async fn test_hub_fans_out_to_all_subscribers() {
        let hub = MemoryHub::new();
        let mut first = hub.subscribe("purge").await.unwrap();
        let mut second = hub.subscribe("purge").await.unwrap();

        hub.publish("purge", b"PURGE_CACHE").await.unwrap();

        assert_eq!(first.next_purge().await.unwrap().body(), b"PURGE_CACHE");
        assert_eq!(second.next_purge().await.unwrap().body(), b"PURGE_CACHE");
    }

    #[tokio::test]
    async fn test_hub_no_replay_for_late_subscribers() {
        let hub = MemoryHub::new();
        hub.publish("purge", b"early").await.unwrap();

        let mut late = hub.subscribe("purge").await.unwrap();
        hub.close("purge");
        assert_eq!(late.next_purge().await, None);
    }

    #[tokio::test]
    async fn test_hub_publish_without_subscribers_is_ok() {
        let hub = MemoryHub::new();
        hub.publish("purge", b"nobody home").await.unwrap();
    }
}
