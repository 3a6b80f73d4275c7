//! Transport seams for the two invalidation channels.
//!
//! The consumers are generic over these traits so they can be exercised
//! against in-memory transports in tests and wired to the Redis-backed
//! adapters in production. The traits encode the delivery contracts the
//! consumers rely on, not any particular broker's API:
//!
//! - [`EventFeed`]: ordered, at-least-once, commit-after-dispatch delivery
//!   from a durable, replayable log;
//! - [`BroadcastHub`] / [`PurgeFeed`]: fanout delivery to every currently
//!   subscribed receiver, no persistence, no replay, no redelivery.

use async_trait::async_trait;
use quench_core::PurgeSignal;
use thiserror::Error;

use crate::bootstrap::ConnectError;

pub mod memory;
pub mod redis_transport;

pub use memory::{MemoryHub, MemoryLog, MemoryLogFeed, MemoryPurgeFeed};
pub use redis_transport::{
    BroadcastConnector, ChangeLogConnector, RedisBroadcastHub, RedisPurgeFeed, RedisStreamFeed,
};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure reading from an established change-log feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("change feed transport error: {0}")]
    Transport(String),
}

/// Failure publishing to a broadcast exchange.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("broadcast transport error: {0}")]
    Transport(String),
}

// ============================================================================
// DURABLE LOG FEED
// ============================================================================

/// An established subscription to the durable change log.
///
/// Events arrive in log order. Delivery advances the committed position
/// immediately (commit-after-dispatch): a crash between delivery and the
/// completed invalidation skips that event on restart. That risk is
/// accepted because the invalidation target is one coarse key and the
/// broadcast channel provides an independent path to the same effect.
#[async_trait]
pub trait EventFeed: Send {
    /// Block until the next event body arrives.
    ///
    /// `Ok(None)` means the feed has ended; the consumer terminates.
    async fn next_event(&mut self) -> Result<Option<Vec<u8>>, FeedError>;
}

// ============================================================================
// FANOUT BROADCAST
// ============================================================================

/// An established private subscription to a fanout exchange.
#[async_trait]
pub trait PurgeFeed: Send {
    /// Block until the next broadcast message arrives.
    ///
    /// `None` means the subscription has ended.
    async fn next_purge(&mut self) -> Option<PurgeSignal>;
}

/// A fanout broadcast exchange.
///
/// `subscribe` idempotently declares the exchange and binds a private,
/// exclusive subscription: every message published while subscribed is
/// delivered to every subscriber, and nothing outlives a subscriber's
/// disconnect.
#[async_trait]
pub trait BroadcastHub: Send + Sync {
    type Feed: PurgeFeed;

    /// Declare the exchange if needed and open a private subscription.
    async fn subscribe(&self, exchange: &str) -> Result<Self::Feed, ConnectError>;

    /// Publish a message to every current subscriber of the exchange.
    async fn publish(&self, exchange: &str, body: &[u8]) -> Result<(), HubError>;
}
