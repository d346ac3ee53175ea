//! Ledger record types.
//!
//! `AuditEvent` is one line of the ledger file.  `EventRequest` is what a
//! caller hands to the writer; the writer stamps the time and the hashes.
//! `ChainTip` is the cached pointer to the most recent record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record in the hash-chained ledger.
///
/// `current_hash` commits to every other field.  `prev_hash` commits to the
/// previous record's `current_hash`, or is `GENESIS_HASH` at the start of an
/// epoch.  Editing any field, including anything nested inside `details`,
/// makes the stored `current_hash` disagree with the recomputed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Short identifier of what happened.
    pub action: String,

    /// Grouping of the action.
    pub category: String,

    /// Caller-owned payload.  Opaque to the ledger.
    pub details: Map<String, Value>,

    /// Seconds since the Unix epoch, fractional.
    pub timestamp: f64,

    /// ISO-8601 rendering of `timestamp` in UTC.
    pub datetime_utc: String,

    /// `current_hash` of the preceding record, or `GENESIS_HASH`.
    pub prev_hash: String,

    /// SHA-256 (lowercase hex) of the canonical encoding of every field above.
    pub current_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first record in every epoch: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// The action that marks the start of a new epoch.
    pub const RESET_ACTION: &'static str = "audit_system_initialized";

    /// True if this record carries the epoch marker action.
    pub fn is_reset_marker(&self) -> bool {
        self.action == Self::RESET_ACTION
    }

    /// True if this record legally opens a new epoch: a reset marker whose
    /// own `prev_hash` is already `GENESIS_HASH`.
    pub fn opens_epoch(&self) -> bool {
        self.is_reset_marker() && self.prev_hash == Self::GENESIS_HASH
    }
}

/// A logical append request, before the writer stamps time and hashes.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub action: String,
    pub category: String,
    pub details: Map<String, Value>,

    /// Link to `GENESIS_HASH` instead of the current tip.
    pub is_reset: bool,
}

impl EventRequest {
    pub fn new(action: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            category: category.into(),
            details: Map::new(),
            is_reset: false,
        }
    }

    /// The epoch marker request (`RESET_ACTION`, `is_reset = true`).
    pub fn reset(category: impl Into<String>) -> Self {
        Self {
            is_reset: true,
            ..Self::new(AuditEvent::RESET_ACTION, category)
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// The cached chain tip, persisted next to the ledger.
///
/// Never authoritative.  Readers that need the true tip walk the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTip {
    pub last_hash: String,
    pub timestamp: f64,
    pub datetime: String,
}

/// True if `s` is a 64-character lowercase hex string.
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
