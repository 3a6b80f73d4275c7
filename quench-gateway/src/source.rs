//! Source-of-Record Access
//!
//! The gateway reaches the authoritative store only through the
//! [`CollectionSource`] trait, so tests inject a fake and production wires
//! a PostgreSQL pool. The source owns the truth; the cache is only an
//! accelerator in front of it.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use quench_core::User;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use tokio_postgres::NoTls;

// ============================================================================
// ERRORS
// ============================================================================

/// Source-of-record errors. Fatal to the request that triggered them.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("source query failed: {0}")]
    Query(String),
}

// ============================================================================
// COLLECTION SOURCE TRAIT
// ============================================================================

/// Authoritative reader for the cached collection.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Fetch the full collection in its canonical order.
    async fn fetch_all(&self) -> Result<Vec<User>, SourceError>;
}

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            port: 5432,
            dbname: "social_db".to_string(),
            user: "admin".to_string(),
            password: "admin".to_string(),
            max_size: 16,
        }
    }
}

impl DbConfig {
    /// Create a database configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUENCH_DB_HOST`: PostgreSQL host (default: "postgres")
    /// - `QUENCH_DB_PORT`: PostgreSQL port (default: 5432)
    /// - `QUENCH_DB_NAME`: Database name (default: "social_db")
    /// - `QUENCH_DB_USER`: Database user (default: "admin")
    /// - `QUENCH_DB_PASSWORD`: Database password (default: "admin")
    /// - `QUENCH_DB_POOL_SIZE`: Maximum pool size (default: 16)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("QUENCH_DB_HOST").unwrap_or_else(|_| "postgres".to_string()),
            port: std::env::var("QUENCH_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("QUENCH_DB_NAME").unwrap_or_else(|_| "social_db".to_string()),
            user: std::env::var("QUENCH_DB_USER").unwrap_or_else(|_| "admin".to_string()),
            password: std::env::var("QUENCH_DB_PASSWORD").unwrap_or_else(|_| "admin".to_string()),
            max_size: std::env::var("QUENCH_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> Result<Pool, SourceError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| SourceError::Pool(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// POSTGRES SOURCE
// ============================================================================

/// Source-of-record backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgSource {
    pool: Pool,
}

impl PgSource {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> Result<Self, SourceError> {
        Ok(Self::new(config.create_pool()?))
    }
}

#[async_trait]
impl CollectionSource for PgSource {
    async fn fetch_all(&self) -> Result<Vec<User>, SourceError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| SourceError::Pool(e.to_string()))?;

        let rows = conn
            .query(
                "SELECT id, username, bio, updated_at FROM users ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| User {
                id: row.get(0),
                username: row.get(1),
                bio: row.get(2),
                updated_at: row.get(3),
            })
            .collect())
    }
}

// ============================================================================
// FIXED SOURCE (tests)
// ============================================================================

/// In-memory source that serves a fixed collection and counts fetches.
#[derive(Default)]
pub struct FixedSource {
    users: RwLock<Vec<User>>,
    fetches: AtomicU64,
}

impl FixedSource {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
            fetches: AtomicU64::new(0),
        }
    }

    /// Replace the served collection (an "external write" in tests).
    pub fn set_users(&self, users: Vec<User>) {
        *self.users.write().unwrap() = users;
    }

    /// Number of fetch_all calls observed.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CollectionSource for FixedSource {
    async fn fetch_all(&self) -> Result<Vec<User>, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.users.read().unwrap().clone())
    }
}
