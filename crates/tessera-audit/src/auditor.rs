//! Forensic scan of a ledger.
//!
//! Every record gets two independent checks:
//!
//! - **LINK**: stored `prev_hash` must equal the running expectation.  The
//!   expectation starts at `GENESIS_HASH` and, after each record, becomes that
//!   record's *stored* `current_hash`.  A reset marker whose `prev_hash` is
//!   `GENESIS_HASH` is a legal epoch boundary and is checked against genesis.
//! - **CONTENT**: the recomputed canonical hash must equal the stored
//!   `current_hash`.
//!
//! Advancing on the stored hash means one edited record produces one CONTENT
//! anomaly and no LINK anomalies downstream.  It also means a tamperer who
//! rewrites every later `prev_hash` to match a doctored `current_hash` is
//! reported only once, at the edited record.
//!
//! Unparsable lines are MALFORMED and leave the expectation untouched.  The
//! scan never stops early.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use tessera_contracts::{
    error::LedgerResult,
    event::AuditEvent,
    report::{Anomaly, AuditReport, PendingTail},
};
use tessera_core::{
    canonical::compute_hash,
    ledger::{self, ParsedLine},
};

/// Tuning for `Auditor::audit_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOptions {
    /// Delay before re-reading a ledger whose last line is still being
    /// written.  `None` reports the pending tail without waiting.
    pub pending_retry: Option<Duration>,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            pending_retry: Some(Duration::from_millis(200)),
        }
    }
}

/// Read-only ledger auditor.
///
/// Holds configuration only; every scan starts from scratch, so one auditor
/// can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct Auditor {
    options: AuditOptions,
}

impl Auditor {
    pub fn new(options: AuditOptions) -> Self {
        Self { options }
    }

    /// Audit the ledger at `path`.
    ///
    /// If the last line is unterminated and unparsable it is treated as an
    /// append in flight: the file is re-read once after `pending_retry`, and
    /// if the line is still incomplete it is reported as `pending` rather
    /// than MALFORMED.
    ///
    /// Errors only if the file exists but cannot be read.
    pub fn audit_path(&self, path: &Path) -> LedgerResult<AuditReport> {
        let mut report = audit_bytes(&ledger::read_ledger(path)?);

        if let (Some(pending), Some(delay)) = (&report.pending, self.options.pending_retry) {
            debug!(
                ledger = %path.display(),
                line = pending.line,
                delay_ms = delay.as_millis() as u64,
                "last line incomplete, re-reading"
            );
            thread::sleep(delay);
            report = audit_bytes(&ledger::read_ledger(path)?);
        }

        if let Some(pending) = &report.pending {
            warn!(
                ledger = %path.display(),
                line = pending.line,
                "last line is incomplete; treating it as an append in progress"
            );
        }

        info!(
            ledger = %path.display(),
            records = report.records_scanned,
            anomalies = report.anomalies.len(),
            "audit complete"
        );
        Ok(report)
    }
}

/// Audit raw ledger contents.
///
/// Splits off an unterminated, unparsable last line as `pending` and folds
/// the rest through [`audit_records`].
pub fn audit_bytes(contents: &[u8]) -> AuditReport {
    let mut parsed = ledger::parse_lines(contents);

    let pending = match parsed.last() {
        Some((line, Err(reason))) if ledger::has_unterminated_tail(contents) => Some(PendingTail {
            line: *line,
            reason: reason.clone(),
        }),
        _ => None,
    };
    if pending.is_some() {
        parsed.pop();
    }

    AuditReport {
        pending,
        ..audit_records(parsed)
    }
}

/// The scan itself: a fold over parsed lines.
///
/// Pure and reentrant.  The running expectation lives in the accumulator,
/// not in any long-lived state.
pub fn audit_records<I>(records: I) -> AuditReport
where
    I: IntoIterator<Item = ParsedLine>,
{
    let start = Scan {
        expected: AuditEvent::GENESIS_HASH.to_string(),
        report: AuditReport::default(),
    };
    records.into_iter().fold(start, Scan::step).report
}

/// Fold accumulator for `audit_records`.
struct Scan {
    expected: String,
    report: AuditReport,
}

impl Scan {
    fn step(mut self, (line, parsed): ParsedLine) -> Self {
        let event = match parsed {
            Ok(event) => event,
            Err(reason) => {
                debug!(line, reason = %reason, "malformed ledger line");
                self.report.anomalies.push(Anomaly::malformed(line, reason));
                return self;
            }
        };
        self.report.records_scanned += 1;

        let expected_prev = if event.opens_epoch() {
            AuditEvent::GENESIS_HASH
        } else {
            self.expected.as_str()
        };
        if event.prev_hash != expected_prev {
            debug!(line, expected = %expected_prev, found = %event.prev_hash, "broken link");
            self.report
                .anomalies
                .push(Anomaly::link(line, expected_prev, event.prev_hash.as_str()));
        }

        match compute_hash(&event) {
            Ok(recomputed) if recomputed == event.current_hash => {}
            Ok(recomputed) => {
                debug!(line, recomputed = %recomputed, stored = %event.current_hash, "content mismatch");
                self.report
                    .anomalies
                    .push(Anomaly::content(line, recomputed, event.current_hash.as_str()));
            }
            Err(e) => {
                self.report.anomalies.push(Anomaly::content(
                    line,
                    format!("<unencodable: {}>", e),
                    event.current_hash.as_str(),
                ));
            }
        }

        self.report.derived_tip = Some(event.current_hash.clone());
        self.expected = event.current_hash;
        self
    }
}
