//! Bounded-retry connection establishment shared by both invalidators.
//!
//! State machine: `Disconnected -> Connecting -> Connected | Failed`.
//! Every failed attempt, whether the transport is simply not up yet or the
//! error is something else entirely, consumes one retry and waits a fixed
//! backoff. Exhausting the budget is terminal: the owning process must exit
//! non-zero rather than run half-initialized. Success is also terminal:
//! there is no reconnection after startup; a later connection loss ends the
//! consume loop and recovery is the orchestrator's job.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// RETRY POLICY
// ============================================================================

const DEFAULT_MAX_RETRIES: u32 = 12;
const DEFAULT_BACKOFF_SECS: u64 = 5;

/// Fixed-backoff retry budget for startup connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum connection attempts before giving up.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_secs(DEFAULT_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy from environment variables.
    ///
    /// Environment variables:
    /// - `QUENCH_CONNECT_MAX_RETRIES`: Attempts before giving up (default: 12)
    /// - `QUENCH_CONNECT_BACKOFF_SECS`: Seconds between attempts (default: 5)
    pub fn from_env() -> Self {
        Self {
            max_attempts: std::env::var("QUENCH_CONNECT_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            backoff: Duration::from_secs(
                std::env::var("QUENCH_CONNECT_BACKOFF_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BACKOFF_SECS),
            ),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// A single connection attempt's failure.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport-specific "not yet available" case (broker still
    /// starting, DNS not resolving yet, connection refused).
    #[error("transport not yet available: {0}")]
    Unavailable(String),

    /// Any other connection error. Not distinguished further: it consumes
    /// a retry like an unavailable transport does.
    #[error("connection failed: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Terminal bootstrap failure after the retry budget is spent.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to connect to {target} after {attempts} attempts")]
    RetriesExhausted { target: String, attempts: u32 },
}

// ============================================================================
// CONNECT TRAIT
// ============================================================================

/// A transport a consumer must connect to before it can consume.
///
/// Implementations classify their transport's startup errors into
/// [`ConnectError::Unavailable`] so the bootstrapper can log them at the
/// right level; everything else maps to [`ConnectError::Other`].
#[async_trait]
pub trait Connect: Send + Sync {
    /// The established connection handed to the consume loop.
    type Conn: Send;

    /// Human-readable connection target, for logging.
    fn target(&self) -> String;

    /// Attempt one connection.
    async fn connect(&self) -> Result<Self::Conn, ConnectError>;
}

// ============================================================================
// ESTABLISH
// ============================================================================

/// Establish a connection under the retry policy.
///
/// Returns the connection on the first successful attempt, or
/// [`BootstrapError::RetriesExhausted`] once `policy.max_attempts` attempts
/// have failed. Waits `policy.backoff` after every failed attempt.
pub async fn establish<C: Connect>(
    connector: &C,
    policy: &RetryPolicy,
) -> Result<C::Conn, BootstrapError> {
    let target = connector.target();

    for attempt in 1..=policy.max_attempts {
        match connector.connect().await {
            Ok(conn) => {
                tracing::info!(target = %target, attempt, "Successfully connected");
                return Ok(conn);
            }
            Err(ConnectError::Unavailable(reason)) => {
                tracing::warn!(
                    target = %target,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_secs = policy.backoff.as_secs(),
                    %reason,
                    "Transport not available, retrying"
                );
            }
            Err(ConnectError::Other(error)) => {
                tracing::error!(target = %target, attempt, %error, "Error connecting to transport");
            }
        }
        tokio::time::sleep(policy.backoff).await;
    }

    Err(BootstrapError::RetriesExhausted {
        target,
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Connector that fails with `Unavailable` until a threshold attempt.
    struct FlakyConnector {
        attempts: AtomicU32,
        succeed_on: u32,
    }

    impl FlakyConnector {
        fn never_available() -> Self {
            Self {
                attempts: AtomicU32::new(0),
                succeed_on: u32::MAX,
            }
        }

        fn available_on(succeed_on: u32) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                succeed_on,
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connect for FlakyConnector {
        type Conn = ();

        fn target(&self) -> String {
            "test://flaky".to_string()
        }

        async fn connect(&self) -> Result<(), ConnectError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.succeed_on {
                Ok(())
            } else {
                Err(ConnectError::Unavailable("connection refused".into()))
            }
        }
    }

    /// Connector that always fails with a non-availability error.
    struct BrokenConnector {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Connect for BrokenConnector {
        type Conn = ();

        fn target(&self) -> String {
            "test://broken".to_string()
        }

        async fn connect(&self) -> Result<(), ConnectError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ConnectError::Other("bad credentials".into()))
        }
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 12);
        assert_eq!(policy.backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_policy_from_env_defaults() {
        // Without environment variables set, should use defaults.
        assert_eq!(RetryPolicy::from_env(), RetryPolicy::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_exactly_max_attempts_with_fixed_backoff() {
        let policy = RetryPolicy::default();
        let connector = FlakyConnector::never_available();
        let started = tokio::time::Instant::now();

        let result = establish(&connector, &policy).await;

        assert!(matches!(
            result,
            Err(BootstrapError::RetriesExhausted { attempts: 12, .. })
        ));
        assert_eq!(connector.attempts(), 12);
        // Fixed backoff after every failed attempt: 12 x 5s of virtual time.
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_once_transport_comes_up() {
        let policy = RetryPolicy::default();
        let connector = FlakyConnector::available_on(3);

        establish(&connector, &policy).await.unwrap();

        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_availability_errors_also_consume_attempts() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_secs(5),
        };
        let connector = BrokenConnector {
            attempts: AtomicU32::new(0),
        };

        let result = establish(&connector, &policy).await;

        assert!(matches!(
            result,
            Err(BootstrapError::RetriesExhausted { attempts: 4, .. })
        ));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_first_attempt_success_needs_no_backoff() {
        let policy = RetryPolicy::default();
        let connector = FlakyConnector::available_on(1);

        establish(&connector, &policy).await.unwrap();

        assert_eq!(connector.attempts(), 1);
    }
}
