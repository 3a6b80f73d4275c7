//! Redis-backed transport adapters.
//!
//! The durable log is a Redis Streams consumer group: `XGROUP CREATE ... 0
//! MKSTREAM` gives an idempotent declaration that starts a new group at the
//! earliest retained entry, and `XREADGROUP ... BLOCK 0 NOACK` delivers in
//! log order while advancing the group's committed position at delivery
//! (commit-after-dispatch, no redelivery).
//!
//! The fanout broadcast is Redis pub/sub: one channel per exchange name,
//! every currently subscribed connection receives every published message,
//! nothing is persisted or replayed.

use async_trait::async_trait;
use futures_util::StreamExt;
use quench_core::PurgeSignal;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use super::{BroadcastHub, EventFeed, FeedError, HubError, PurgeFeed};
use crate::bootstrap::{Connect, ConnectError};
use crate::broadcast::BroadcastConfig;
use crate::changelog::ChangeLogConfig;

/// Field under which the change-log publisher stores the event body.
const EVENT_BODY_FIELD: &str = "payload";

fn classify(err: redis::RedisError) -> ConnectError {
    if matches!(err.kind(), redis::ErrorKind::IoError) {
        ConnectError::Unavailable(err.to_string())
    } else {
        ConnectError::Other(Box::new(err))
    }
}

// ============================================================================
// CHANGE-LOG FEED (Redis Streams)
// ============================================================================

/// Connector for the change-log stream, used with the bootstrapper.
pub struct ChangeLogConnector {
    config: ChangeLogConfig,
}

impl ChangeLogConnector {
    pub fn new(config: ChangeLogConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connect for ChangeLogConnector {
    type Conn = RedisStreamFeed;

    fn target(&self) -> String {
        format!("{}/{}", self.config.addr, self.config.topic)
    }

    async fn connect(&self) -> Result<RedisStreamFeed, ConnectError> {
        let client = redis::Client::open(self.config.addr.as_str()).map_err(classify)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(classify)?;

        // Declare the consumer group at the earliest retained offset. A
        // group that already exists keeps its committed position.
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(&self.config.topic, &self.config.group, "0")
            .await;
        match created {
            Ok(()) => {}
            Err(err) if err.code() == Some("BUSYGROUP") => {}
            Err(err) => return Err(classify(err)),
        }

        Ok(RedisStreamFeed {
            conn,
            topic: self.config.topic.clone(),
            group: self.config.group.clone(),
            consumer: format!("{}-{}", self.config.group, std::process::id()),
        })
    }
}

/// Established change-log subscription over a Redis Streams consumer group.
pub struct RedisStreamFeed {
    conn: MultiplexedConnection,
    topic: String,
    group: String,
    consumer: String,
}

#[async_trait]
impl EventFeed for RedisStreamFeed {
    async fn next_event(&mut self) -> Result<Option<Vec<u8>>, FeedError> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1)
            .block(0)
            .noack();

        loop {
            let reply: StreamReadReply = self
                .conn
                .xread_options(&[&self.topic], &[">"], &options)
                .await
                .map_err(|e| FeedError::Transport(e.to_string()))?;

            for key in &reply.keys {
                for entry in &key.ids {
                    match entry.get::<Vec<u8>>(EVENT_BODY_FIELD) {
                        Some(body) => return Ok(Some(body)),
                        None => {
                            tracing::trace!(id = %entry.id, "Stream entry without event body, skipping");
                        }
                    }
                }
            }
        }
    }
}

// ============================================================================
// BROADCAST HUB (Redis pub/sub)
// ============================================================================

/// Fanout broadcast over Redis pub/sub channels.
pub struct RedisBroadcastHub {
    client: redis::Client,
}

impl RedisBroadcastHub {
    pub fn open(addr: &str) -> Result<Self, ConnectError> {
        let client = redis::Client::open(addr).map_err(classify)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BroadcastHub for RedisBroadcastHub {
    type Feed = RedisPurgeFeed;

    async fn subscribe(&self, exchange: &str) -> Result<RedisPurgeFeed, ConnectError> {
        // Pub/sub channels need no declaration; the subscription itself is
        // the private, exclusive binding.
        let mut pubsub = self.client.get_async_pubsub().await.map_err(classify)?;
        pubsub.subscribe(exchange).await.map_err(classify)?;
        Ok(RedisPurgeFeed { pubsub })
    }

    async fn publish(&self, exchange: &str, body: &[u8]) -> Result<(), HubError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        let _: () = conn
            .publish(exchange, body)
            .await
            .map_err(|e| HubError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Established broadcast subscription over a Redis pub/sub channel.
pub struct RedisPurgeFeed {
    pubsub: redis::aio::PubSub,
}

#[async_trait]
impl PurgeFeed for RedisPurgeFeed {
    async fn next_purge(&mut self) -> Option<PurgeSignal> {
        let mut messages = self.pubsub.on_message();
        messages
            .next()
            .await
            .map(|msg| PurgeSignal::new(msg.get_payload_bytes()))
    }
}

/// Connector for the broadcast exchange, used with the bootstrapper.
pub struct BroadcastConnector {
    config: BroadcastConfig,
}

impl BroadcastConnector {
    pub fn new(config: BroadcastConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connect for BroadcastConnector {
    type Conn = RedisPurgeFeed;

    fn target(&self) -> String {
        format!("{}/{}", self.config.addr, self.config.exchange)
    }

    async fn connect(&self) -> Result<RedisPurgeFeed, ConnectError> {
        let hub = RedisBroadcastHub::open(&self.config.addr)?;
        hub.subscribe(&self.config.exchange).await
    }
}
