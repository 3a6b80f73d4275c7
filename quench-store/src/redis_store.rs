//! Redis cache store adapter.
//!
//! Uses a tokio `ConnectionManager`, which multiplexes commands over one
//! connection and transparently re-establishes it after a drop, so a brief
//! store outage degrades individual operations instead of the process.

use crate::{CacheStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "redis".to_string(),
            port: 6379,
        }
    }
}

impl RedisConfig {
    /// Create a Redis configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUENCH_REDIS_HOST`: Redis host (default: "redis")
    /// - `QUENCH_REDIS_PORT`: Redis port (default: 6379)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("QUENCH_REDIS_HOST").unwrap_or_else(|_| "redis".to_string()),
            port: std::env::var("QUENCH_REDIS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6379),
        }
    }

    /// Connection URL for the redis client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Cache store backed by Redis.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis using the given configuration.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(url = %config.url(), "Connected to cache store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = conn.get(key).await?;
        Ok(payload)
    }

    async fn set(&self, key: &str, payload: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, payload).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // DEL returns the number of keys removed; zero for an absent key is
        // still success.
        let _: i64 = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.host, "redis");
        assert_eq!(config.port, 6379);
        assert_eq!(config.url(), "redis://redis:6379");
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Without environment variables set, should use defaults.
        let config = RedisConfig::from_env();
        assert_eq!(config.host, "redis");
        assert_eq!(config.port, 6379);
    }
}
