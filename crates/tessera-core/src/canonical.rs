//! Canonical encoding and hashing of ledger records.
//!
//! The hash input is the compact JSON encoding of the six hashable fields,
//! with object keys sorted lexicographically at every nesting level:
//!
//!   {"action":…,"category":…,"details":{…},"datetime_utc":…,"prev_hash":…,"timestamp":…}
//!
//! `current_hash` is never part of its own input.  The UTF-8 bytes of that
//! encoding are fed to SHA-256 and the digest is rendered as 64 lowercase
//! hex characters.
//!
//! The writer, the auditor, and the recovery engine all go through
//! `compute_hash`, so they can never disagree about what a record's hash is.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::AuditEvent,
};

/// Encode the hashable fields of `event` as canonical JSON bytes.
///
/// Pure: the same logical event always produces the same bytes, whatever the
/// in-memory key order of `details`.
///
/// Returns `LedgerError::Encoding` if `timestamp` is not finite.
pub fn encode(event: &AuditEvent) -> LedgerResult<Vec<u8>> {
    let timestamp = Number::from_f64(event.timestamp).ok_or_else(|| LedgerError::Encoding {
        reason: format!("timestamp {} is not a finite number", event.timestamp),
    })?;

    let mut fields = Map::new();
    fields.insert("action".to_string(), Value::String(event.action.clone()));
    fields.insert("category".to_string(), Value::String(event.category.clone()));
    fields.insert("details".to_string(), Value::Object(event.details.clone()));
    fields.insert("datetime_utc".to_string(), Value::String(event.datetime_utc.clone()));
    fields.insert("prev_hash".to_string(), Value::String(event.prev_hash.clone()));
    fields.insert("timestamp".to_string(), Value::Number(timestamp));

    serde_json::to_vec(&sort_keys(&Value::Object(fields))).map_err(|e| LedgerError::Encoding {
        reason: format!("failed to serialize canonical form: {}", e),
    })
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Recompute the `current_hash` that `event` should carry.
pub fn compute_hash(event: &AuditEvent) -> LedgerResult<String> {
    encode(event).map(|bytes| hash_bytes(&bytes))
}

/// Convert a caller payload into a `details` map.
///
/// Returns `LedgerError::Encoding` if `payload` does not serialize to a JSON
/// object (a map with non-string keys, a bare scalar, a non-finite float).
pub fn to_details<T: Serialize>(payload: &T) -> LedgerResult<Map<String, Value>> {
    let value = serde_json::to_value(payload).map_err(|e| LedgerError::Encoding {
        reason: format!("payload is not representable as JSON: {}", e),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(LedgerError::Encoding {
            reason: format!("payload must be a JSON object, got {}", json_type(&other)),
        }),
    }
}

/// Rebuild `value` with object keys in lexicographic order at every level.
///
/// Independent of whether `serde_json` keeps maps sorted or in insertion
/// order: entries are re-inserted already sorted.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn event_with_details(details: Value) -> AuditEvent {
        AuditEvent {
            action: "config_changed".to_string(),
            category: "admin".to_string(),
            details: details.as_object().cloned().unwrap(),
            timestamp: 1_700_000_000.5,
            datetime_utc: "2023-11-14T22:13:20.500000Z".to_string(),
            prev_hash: AuditEvent::GENESIS_HASH.to_string(),
            current_hash: String::new(),
        }
    }

    /// The encoding is compact JSON with top-level keys in sorted order.
    #[test]
    fn test_encode_layout() {
        let event = event_with_details(json!({ "b": 1, "a": { "y": true, "x": null } }));
        let encoded = String::from_utf8(encode(&event).unwrap()).unwrap();

        assert_eq!(
            encoded,
            concat!(
                r#"{"action":"config_changed","category":"admin","#,
                r#""details":{"a":{"x":null,"y":true},"b":1},"#,
                r#""datetime_utc":"2023-11-14T22:13:20.500000Z","#,
                r#""prev_hash":"0000000000000000000000000000000000000000000000000000000000000000","#,
                r#""timestamp":1700000000.5}"#,
            )
        );
    }

    /// `current_hash` never feeds into its own hash.
    #[test]
    fn test_current_hash_excluded() {
        let mut event = event_with_details(json!({ "k": "v" }));
        let before = compute_hash(&event).unwrap();
        event.current_hash = "f".repeat(64);
        assert_eq!(compute_hash(&event).unwrap(), before);
    }

    /// Repeated calls produce identical bytes.
    #[test]
    fn test_encode_is_stable() {
        let event = event_with_details(json!({ "n": [3, 2, 1], "s": "x" }));
        assert_eq!(encode(&event).unwrap(), encode(&event).unwrap());
    }

    /// Every hashable field contributes to the hash.
    #[test]
    fn test_each_field_changes_hash() {
        let base = event_with_details(json!({ "k": "v" }));
        let original = compute_hash(&base).unwrap();

        let mut e = base.clone();
        e.action.push('!');
        assert_ne!(compute_hash(&e).unwrap(), original);

        let mut e = base.clone();
        e.category.push('!');
        assert_ne!(compute_hash(&e).unwrap(), original);

        let mut e = base.clone();
        e.details.insert("k".to_string(), json!("w"));
        assert_ne!(compute_hash(&e).unwrap(), original);

        let mut e = base.clone();
        e.timestamp += 1.0;
        assert_ne!(compute_hash(&e).unwrap(), original);

        let mut e = base.clone();
        e.datetime_utc.push('x');
        assert_ne!(compute_hash(&e).unwrap(), original);

        let mut e = base;
        e.prev_hash = "1".repeat(64);
        assert_ne!(compute_hash(&e).unwrap(), original);
    }

    /// The hash is plain SHA-256 over the canonical bytes.
    #[test]
    fn test_hash_matches_manual_sha256() {
        let event = event_with_details(json!({ "k": "v" }));
        let manual = hex::encode(Sha256::digest(encode(&event).unwrap()));
        let hash = compute_hash(&event).unwrap();
        assert_eq!(hash, manual);
        assert_eq!(hash.len(), 64);
        assert!(tessera_contracts::is_valid_hash(&hash));
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        let mut event = event_with_details(json!({}));
        event.timestamp = f64::NAN;
        assert!(matches!(encode(&event), Err(LedgerError::Encoding { .. })));
        event.timestamp = f64::INFINITY;
        assert!(matches!(compute_hash(&event), Err(LedgerError::Encoding { .. })));
    }

    #[test]
    fn test_to_details_accepts_maps() {
        let mut payload = HashMap::new();
        payload.insert("user", "alice");
        let details = to_details(&payload).unwrap();
        assert_eq!(details["user"], json!("alice"));
    }

    #[test]
    fn test_to_details_rejects_non_objects() {
        assert!(matches!(to_details(&vec![1, 2]), Err(LedgerError::Encoding { .. })));
        assert!(matches!(to_details(&"text"), Err(LedgerError::Encoding { .. })));

        let mut non_string_keys = HashMap::new();
        non_string_keys.insert(vec![1u8], 1);
        assert!(matches!(to_details(&non_string_keys), Err(LedgerError::Encoding { .. })));
    }

    proptest! {
        /// Insertion order of `details` never changes the encoding.
        #[test]
        fn prop_key_order_independent(
            entries in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12)
        ) {
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reversed: Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!({ "inner": v, "k": k }))).collect();
            let reversed_again: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!({ "k": k, "inner": v }))).collect();

            let mut a = event_with_details(json!({}));
            a.details = forward.clone();
            let mut b = event_with_details(json!({}));
            b.details = forward.into_iter().rev().collect();
            prop_assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());

            let mut c = event_with_details(json!({}));
            c.details = reversed;
            let mut d = event_with_details(json!({}));
            d.details = reversed_again;
            prop_assert_eq!(encode(&c).unwrap(), encode(&d).unwrap());
        }
    }
}
