//! Gateway Service Configuration
//!
//! Bind address configuration for the HTTP surface. Store and source
//! configuration live with their adapters (`quench_store::RedisConfig`,
//! [`crate::source::DbConfig`]).

use std::net::SocketAddr;

use crate::error::{ApiError, ApiResult};

/// HTTP bind configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl GatewayConfig {
    /// Create a gateway configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUENCH_GATEWAY_BIND`: Interface to bind (default: "0.0.0.0")
    /// - `PORT` or `QUENCH_GATEWAY_PORT`: Port to bind (default: 3000)
    pub fn from_env() -> Self {
        let host =
            std::env::var("QUENCH_GATEWAY_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("QUENCH_GATEWAY_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        Self { host, port }
    }

    /// Resolve the bind address.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_invalid_host_is_rejected() {
        let config = GatewayConfig {
            host: "not an address".to_string(),
            port: 3000,
        };
        assert!(config.bind_addr().is_err());
    }
}
