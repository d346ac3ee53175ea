//! # tessera-contracts
//!
//! Shared record, report, and error types for the Tessera audit ledger.
//!
//! All crates in the workspace import from here.  No I/O and no hashing live
//! in this crate, only data definitions and error types.

pub mod error;
pub mod event;
pub mod policy;
pub mod report;

pub use error::{LedgerError, LedgerResult};
pub use event::{is_valid_hash, AuditEvent, ChainTip, EventRequest};
pub use policy::MalformedPolicy;
pub use report::{abbreviate, Anomaly, AnomalyKind, AuditReport, PendingTail, RepairReport};

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    fn sample_event() -> AuditEvent {
        AuditEvent {
            action: "user_login".to_string(),
            category: "auth".to_string(),
            details: json!({ "user": "alice", "mfa": true })
                .as_object()
                .cloned()
                .unwrap(),
            timestamp: 1_700_000_000.25,
            datetime_utc: "2023-11-14T22:13:20.250000Z".to_string(),
            prev_hash: AuditEvent::GENESIS_HASH.to_string(),
            current_hash: "ab".repeat(32),
        }
    }

    // ── AuditEvent ───────────────────────────────────────────────────────────

    #[test]
    fn genesis_hash_is_64_zeros() {
        assert_eq!(AuditEvent::GENESIS_HASH.len(), 64);
        assert!(AuditEvent::GENESIS_HASH.chars().all(|c| c == '0'));
        assert!(is_valid_hash(AuditEvent::GENESIS_HASH));
    }

    #[test]
    fn opens_epoch_requires_marker_and_genesis() {
        let mut event = sample_event();
        assert!(!event.opens_epoch(), "ordinary action never opens an epoch");

        event.action = AuditEvent::RESET_ACTION.to_string();
        assert!(event.opens_epoch());

        event.prev_hash = "cd".repeat(32);
        assert!(event.is_reset_marker());
        assert!(
            !event.opens_epoch(),
            "a marker linked to a real predecessor is not an epoch boundary"
        );
    }

    #[test]
    fn event_parses_from_ledger_line() {
        let line = r#"{"action":"a","category":"c","details":{"k":[1,2,{"z":null}]},"timestamp":1700000000,"datetime_utc":"2023-11-14T22:13:20Z","prev_hash":"0000000000000000000000000000000000000000000000000000000000000000","current_hash":"ff"}"#;
        let event: AuditEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.action, "a");
        assert_eq!(event.timestamp, 1_700_000_000.0);
        assert_eq!(event.details["k"][2]["z"], serde_json::Value::Null);
    }

    #[test]
    fn event_missing_field_is_rejected() {
        let line = r#"{"action":"a","category":"c","details":{},"timestamp":1.0,"prev_hash":"00"}"#;
        assert!(serde_json::from_str::<AuditEvent>(line).is_err());
    }

    #[test]
    fn reset_request_sets_marker_action() {
        let request = EventRequest::reset("system").with_detail("version", json!("1.0"));
        assert!(request.is_reset);
        assert_eq!(request.action, AuditEvent::RESET_ACTION);
        assert_eq!(request.details["version"], json!("1.0"));
    }

    #[test]
    fn is_valid_hash_rejects_uppercase_and_short() {
        assert!(is_valid_hash(&"a1".repeat(32)));
        assert!(!is_valid_hash(&"A1".repeat(32)));
        assert!(!is_valid_hash("abc"));
        assert!(!is_valid_hash(&"g0".repeat(32)));
    }

    #[test]
    fn malformed_policy_defaults_to_drop() {
        assert_eq!(MalformedPolicy::default(), MalformedPolicy::Drop);
        let decoded: MalformedPolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(decoded, MalformedPolicy::Abort);
    }

    // ── Reports ──────────────────────────────────────────────────────────────

    #[test]
    fn anomaly_kind_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&AnomalyKind::Content).unwrap(), "\"CONTENT\"");
        assert_eq!(AnomalyKind::Malformed.to_string(), "MALFORMED");
    }

    #[test]
    fn anomaly_display_truncates_hashes() {
        let anomaly = Anomaly::link(7, "1".repeat(64), "2".repeat(64));
        let line = anomaly.to_string();
        assert!(line.starts_with("line 7: LINK"));
        assert!(line.contains("1111111111111111..."));
        assert!(!line.contains(&"1".repeat(17)));
    }

    #[test]
    fn audit_report_counts_by_kind() {
        let report = AuditReport {
            anomalies: vec![
                Anomaly::content(2, "a", "b"),
                Anomaly::link(3, "a", "b"),
                Anomaly::content(5, "a", "b"),
            ],
            records_scanned: 5,
            derived_tip: None,
            pending: None,
        };
        assert!(!report.is_clean());
        assert_eq!(report.count(AnomalyKind::Content), 2);
        assert_eq!(report.count(AnomalyKind::Malformed), 0);
        assert_eq!(report.at_line(3).count(), 1);
    }

    #[test]
    fn repair_report_noop() {
        let report = RepairReport {
            events_total: 4,
            events_modified: 0,
            links_repaired: 0,
            hashes_repaired: 0,
            events_dropped: 0,
            backup_path: PathBuf::from("ledger.jsonl.backup_1"),
            final_tip: AuditEvent::GENESIS_HASH.to_string(),
        };
        assert!(report.is_noop());
    }

    // ── LedgerError display messages ─────────────────────────────────────────

    #[test]
    fn error_backup_display() {
        let err = LedgerError::Backup {
            path: PathBuf::from("/var/audit/ledger.jsonl"),
            reason: "permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("backup of '/var/audit/ledger.jsonl' failed"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn error_malformed_display() {
        let err = LedgerError::MalformedRecord {
            line: 12,
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(err.to_string(), "malformed record at line 12: EOF while parsing");
    }
}
