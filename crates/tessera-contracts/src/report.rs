//! Diagnostic and repair reports.
//!
//! The auditor produces an `AuditReport`; the recovery engine produces a
//! `RepairReport`.  Both are plain data so callers (a commit gate, a
//! dashboard) can key off them without depending on the scanning code.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Number of hex characters shown when a hash is printed for comparison.
pub const HASH_DISPLAY_LEN: usize = 16;

/// The class of an integrity anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyKind {
    /// Stored `prev_hash` differs from the running expectation.
    Link,
    /// Stored `current_hash` differs from the recomputed digest.
    Content,
    /// The line is not a parseable record.
    Malformed,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnomalyKind::Link => "LINK",
            AnomalyKind::Content => "CONTENT",
            AnomalyKind::Malformed => "MALFORMED",
        };
        f.write_str(label)
    }
}

/// One finding from an audit scan.
///
/// `line` is the 1-based physical line number in the ledger file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub line: usize,
    pub kind: AnomalyKind,
    pub expected: String,
    pub found: String,
}

impl Anomaly {
    pub fn link(line: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            line,
            kind: AnomalyKind::Link,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn content(line: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            line,
            kind: AnomalyKind::Content,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            kind: AnomalyKind::Malformed,
            expected: "a JSON audit record".to_string(),
            found: reason.into(),
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AnomalyKind::Malformed => {
                write!(f, "line {}: {} {}", self.line, self.kind, self.found)
            }
            _ => write!(
                f,
                "line {}: {} expected {} found {}",
                self.line,
                self.kind,
                abbreviate(&self.expected),
                abbreviate(&self.found),
            ),
        }
    }
}

/// An unparsable final line, which may be a record still being written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTail {
    pub line: usize,
    pub reason: String,
}

/// The result of one audit scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Anomalies in file order.
    pub anomalies: Vec<Anomaly>,

    /// Records that parsed, regardless of whether they passed.
    pub records_scanned: usize,

    /// Stored `current_hash` of the last parseable record.
    pub derived_tip: Option<String>,

    /// Set when the last line failed to parse and was not counted as MALFORMED.
    pub pending: Option<PendingTail>,
}

impl AuditReport {
    /// True when no anomaly was found.  A pending tail does not count.
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.anomalies.iter().filter(|a| a.kind == kind).count()
    }

    /// Anomalies reported at `line`.
    pub fn at_line(&self, line: usize) -> impl Iterator<Item = &Anomaly> {
        self.anomalies.iter().filter(move |a| a.line == line)
    }
}

/// The result of one repair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Records written back to the ledger.
    pub events_total: usize,

    /// Records whose `prev_hash` or `current_hash` changed.
    pub events_modified: usize,

    /// Records whose `prev_hash` was forced to the running tip.
    pub links_repaired: usize,

    /// Records whose recomputed `current_hash` differed from the stored one.
    pub hashes_repaired: usize,

    /// Unparsable lines left out of the rewritten ledger.
    pub events_dropped: usize,

    /// Byte-for-byte copy of the ledger taken before any mutation.
    pub backup_path: PathBuf,

    /// Tip of the rewritten ledger (`GENESIS_HASH` if it is empty).
    pub final_tip: String,
}

impl RepairReport {
    /// True when the repair changed nothing but the backup.
    pub fn is_noop(&self) -> bool {
        self.events_modified == 0 && self.events_dropped == 0
    }
}

/// Shorten a hash for side-by-side display.
pub fn abbreviate(hash: &str) -> String {
    match hash.char_indices().nth(HASH_DISPLAY_LEN) {
        Some((idx, _)) => format!("{}...", &hash[..idx]),
        None => hash.to_string(),
    }
}
