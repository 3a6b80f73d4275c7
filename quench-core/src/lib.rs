//! Quench Core - Shared Data Types
//!
//! Pure data structures with no I/O. All other crates depend on this.
//! This crate contains the cached collection record, the change-event
//! envelope with its operation discriminator, and the purge signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod event;

pub use event::{ChangeEvent, Operation};

// ============================================================================
// CACHE KEY CONVENTION
// ============================================================================

/// The single well-known cache key holding the entire serialized collection.
///
/// There are no per-record keys: every invalidation deletes this key and
/// every repopulation writes it. Absence of the key is a valid state (cache
/// miss), never an error.
pub const PRIMARY_COLLECTION_KEY: &str = "collection:primary";

// ============================================================================
// COLLECTION RECORD
// ============================================================================

/// One record of the cached collection.
///
/// The cached payload is the full ordered list of users serialized as JSON;
/// the cache never stores individual records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Primary key in the source-of-record.
    pub id: i32,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    /// Last mutation time as recorded by the source-of-record.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// PURGE SIGNAL
// ============================================================================

/// An administrative purge command received over the broadcast channel.
///
/// The message is content-free by contract: its arrival is the entire
/// payload. The body is retained only so receivers can log what was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSignal {
    body: Vec<u8>,
}

impl PurgeSignal {
    /// Wrap a received broadcast body.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }

    /// The raw body, for logging.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Lossy text rendering of the body, for logging.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_json_roundtrip_without_optional_fields() {
        let json = r#"{"id": 1, "username": "ada"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.username, "ada");
        assert_eq!(user.bio, None);
        assert_eq!(user.updated_at, None);
    }

    #[test]
    fn test_purge_signal_body_text() {
        let signal = PurgeSignal::new(b"PURGE_CACHE".to_vec());
        assert_eq!(signal.body_text(), "PURGE_CACHE");
        assert_eq!(signal.body(), b"PURGE_CACHE");
    }
}
