//! Change-log event envelope and operation classification.
//!
//! The durable log carries row-level mutation notifications whose envelope
//! nests the operation discriminator under `payload.op`. Decoding fails
//! closed: a malformed body, a missing payload, or an unknown op code all
//! classify as [`Operation::Other`], which never invalidates the cache.

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// OPERATION DISCRIMINATOR
// ============================================================================

/// Row-level mutation kind, classified from the envelope's `op` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// Anything that is not a row mutation: snapshot/read markers, unknown
    /// codes, undecodable envelopes.
    Other,
}

impl Operation {
    /// Classify a raw op code from the envelope (`"c"`, `"u"`, `"d"`).
    pub fn from_op_code(code: &str) -> Self {
        match code {
            "c" => Operation::Create,
            "u" => Operation::Update,
            "d" => Operation::Delete,
            _ => Operation::Other,
        }
    }

    /// Whether an event carrying this operation must invalidate the cache.
    pub fn is_invalidating(self) -> bool {
        matches!(
            self,
            Operation::Create | Operation::Update | Operation::Delete
        )
    }
}

// ============================================================================
// ENVELOPE DECODING
// ============================================================================

/// Typed view of the change-log envelope. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    source: Option<Source>,
}

#[derive(Debug, Default, Deserialize)]
struct Source {
    #[serde(default)]
    table: Option<String>,
}

/// A decoded change-log event.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Source table the mutation applied to, when the envelope names one.
    pub table: Option<String>,
    /// Classified operation; [`Operation::Other`] for anything unrecognized.
    pub operation: Operation,
    /// The raw decoded body, `Value::Null` when the body was not valid JSON.
    pub raw: Value,
}

impl ChangeEvent {
    /// Decode an event body, failing closed on every malformed shape.
    ///
    /// This never errors: correctness only requires that recognized row
    /// mutations invalidate, so anything else becomes a non-invalidating
    /// event rather than a decode failure.
    pub fn decode(body: &[u8]) -> Self {
        let raw: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let envelope: Envelope = serde_json::from_value(raw.clone()).unwrap_or_default();

        let (operation, table) = match envelope.payload {
            Some(payload) => {
                let operation = payload
                    .op
                    .as_deref()
                    .map(Operation::from_op_code)
                    .unwrap_or(Operation::Other);
                let table = payload.source.and_then(|s| s.table);
                (operation, table)
            }
            None => (Operation::Other, None),
        };

        Self {
            table,
            operation,
            raw,
        }
    }

    /// Whether this event must invalidate the cache.
    pub fn is_invalidating(&self) -> bool {
        self.operation.is_invalidating()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_create_update_delete_invalidate() {
        for (code, expected) in [
            ("c", Operation::Create),
            ("u", Operation::Update),
            ("d", Operation::Delete),
        ] {
            let body = format!(r#"{{"payload": {{"op": "{code}"}}}}"#);
            let event = ChangeEvent::decode(body.as_bytes());
            assert_eq!(event.operation, expected);
            assert!(event.is_invalidating());
        }
    }

    #[test]
    fn test_snapshot_marker_is_ignored() {
        let event = ChangeEvent::decode(br#"{"payload": {"op": "r"}}"#);
        assert_eq!(event.operation, Operation::Other);
        assert!(!event.is_invalidating());
    }

    #[test]
    fn test_missing_payload_is_ignored() {
        let event = ChangeEvent::decode(br#"{"schema": {}}"#);
        assert!(!event.is_invalidating());
    }

    #[test]
    fn test_missing_op_is_ignored() {
        let event = ChangeEvent::decode(br#"{"payload": {"before": null, "after": {}}}"#);
        assert!(!event.is_invalidating());
    }

    #[test]
    fn test_non_string_op_is_ignored() {
        let event = ChangeEvent::decode(br#"{"payload": {"op": 3}}"#);
        assert!(!event.is_invalidating());
        assert_eq!(event.raw["payload"]["op"], 3);
    }

    #[test]
    fn test_malformed_json_is_ignored() {
        let event = ChangeEvent::decode(b"not json at all");
        assert!(!event.is_invalidating());
        assert_eq!(event.raw, Value::Null);
    }

    #[test]
    fn test_table_is_extracted_from_source() {
        let event =
            ChangeEvent::decode(br#"{"payload": {"op": "u", "source": {"table": "users"}}}"#);
        assert_eq!(event.table.as_deref(), Some("users"));
        assert!(event.is_invalidating());
    }

    proptest! {
        #[test]
        fn prop_unknown_op_codes_never_invalidate(code in "[a-zA-Z0-9]{0,8}") {
            prop_assume!(code != "c" && code != "u" && code != "d");
            let body = serde_json::json!({"payload": {"op": code}});
            let event = ChangeEvent::decode(body.to_string().as_bytes());
            prop_assert!(!event.is_invalidating());
        }

        #[test]
        fn prop_decode_never_panics(body in proptest::collection::vec(any::<u8>(), 0..256)) {
            let event = ChangeEvent::decode(&body);
            // Decoding is total; classification is one of the four variants.
            let _ = event.is_invalidating();
        }
    }
}
