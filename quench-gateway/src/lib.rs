//! Quench Gateway - Read-Through Cache API
//!
//! Serves the cached collection over HTTP: cache hit when the primary key
//! is populated, otherwise one source-of-record query followed by a cache
//! repopulation. The gateway has no channel to the invalidators: it only
//! touches the cache key and the source, and the invalidators independently
//! delete that key underneath it.

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod source;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use gateway::{CollectionRead, GatewayError, ReadThroughGateway};
pub use routes::{api_router, AppState};
pub use source::{CollectionSource, DbConfig, FixedSource, PgSource, SourceError};
