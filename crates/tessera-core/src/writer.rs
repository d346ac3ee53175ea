//! The append engine.
//!
//! `ChainWriter` is the only component that adds records to a ledger.  For
//! each append it:
//!
//!   1. stamps the current time
//!   2. picks `prev_hash`: `GENESIS_HASH` for a reset, otherwise the tip
//!   3. computes `current_hash` over the canonical encoding
//!   4. appends the record as one line and fsyncs
//!   5. updates the tip cache
//!
//! Steps 4 and 5 are separate.  If the process dies between them the ledger
//! is authoritative and the cache is one record behind, which every reader
//! tolerates because none of them trust the cache.
//!
//! The writer itself consults the cache only when it opens.  From then on it
//! holds the ledger lock and tracks the tip in memory, so a failed cache
//! update can never make the next record link to a stale predecessor.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::{AuditEvent, EventRequest},
};

use crate::{
    canonical::compute_hash,
    ledger,
    lock::LedgerLock,
    traits::{Clock, SystemClock, TipStore},
};

/// Appends hash-chained records to a ledger file.
///
/// # Single writer
///
/// Opening a writer takes the exclusive ledger lock; a second writer (in this
/// or another process) fails with `LedgerError::Locked`.  Appends take
/// `&mut self`, so sharing one writer between threads requires an explicit
/// `Mutex`.
pub struct ChainWriter {
    path: PathBuf,
    file: File,
    tips: Box<dyn TipStore>,
    clock: Box<dyn Clock>,
    /// `current_hash` of the last record in the ledger, or genesis.
    tip: String,
    _lock: LedgerLock,
}

impl ChainWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>, tips: Box<dyn TipStore>) -> LedgerResult<Self> {
        Self::with_clock(path, tips, Box::new(SystemClock))
    }

    /// Like `open`, with an explicit time source.
    pub fn with_clock(
        path: impl AsRef<Path>,
        tips: Box<dyn TipStore>,
        clock: Box<dyn Clock>,
    ) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock = LedgerLock::acquire(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| write_error(&path, "open", e))?;

        terminate_partial_line(&path, &mut file)?;

        let mut writer = Self {
            path,
            file,
            tips,
            clock,
            tip: AuditEvent::GENESIS_HASH.to_string(),
            _lock: lock,
        };
        if let Some(derived) = writer.reconcile_tip()? {
            writer.tip = derived;
        }

        debug!(ledger = %writer.path.display(), tip = %writer.tip, "chain writer opened");
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and return it as written.
    ///
    /// Returns `LedgerError::Write` if the line cannot be written and synced,
    /// and `LedgerError::Encoding` if the record cannot be canonicalized.
    /// Nothing is retried.
    pub fn append(
        &mut self,
        action: &str,
        category: &str,
        details: Map<String, Value>,
        is_reset: bool,
    ) -> LedgerResult<AuditEvent> {
        let now = self.clock.now();
        let prev_hash = if is_reset {
            AuditEvent::GENESIS_HASH.to_string()
        } else {
            self.tip.clone()
        };

        let mut event = AuditEvent {
            action: action.to_string(),
            category: category.to_string(),
            details,
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            datetime_utc: now.to_rfc3339_opts(SecondsFormat::Micros, true),
            prev_hash,
            current_hash: String::new(),
        };
        event.current_hash = compute_hash(&event)?;

        let mut line = serde_json::to_string(&event).map_err(|e| LedgerError::Encoding {
            reason: format!("failed to serialize record: {}", e),
        })?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .map_err(|e| write_error(&self.path, "append to", e))?;
        self.file
            .sync_data()
            .map_err(|e| write_error(&self.path, "sync", e))?;
        self.tip = event.current_hash.clone();

        // The ledger is committed and `self.tip` is current.  A failed cache
        // update only leaves the side-file stale until the next open.
        if let Err(e) = self.tips.write(&event.current_hash, now) {
            warn!(
                ledger = %self.path.display(),
                error = %e,
                "record appended but tip cache update failed"
            );
        }

        info!(
            action = %event.action,
            category = %event.category,
            current_hash = %event.current_hash,
            reset = is_reset,
            "audit event appended"
        );

        Ok(event)
    }

    /// Append a prepared `EventRequest`.
    pub fn submit(&mut self, request: EventRequest) -> LedgerResult<AuditEvent> {
        self.append(
            &request.action,
            &request.category,
            request.details,
            request.is_reset,
        )
    }

    /// Open a new epoch with the reset marker record.
    pub fn initialize(&mut self, details: Map<String, Value>) -> LedgerResult<AuditEvent> {
        self.append(AuditEvent::RESET_ACTION, "system", details, true)
    }

    /// The hash the next non-reset record will link to.
    pub fn tip(&self) -> &str {
        &self.tip
    }

    /// Derive the tip from the ledger and bring the cache in line with it.
    ///
    /// A crash between a ledger append and its cache update leaves the cache
    /// one record behind.  An unreadable cache is overwritten the same way.
    fn reconcile_tip(&self) -> LedgerResult<Option<String>> {
        let Some(derived) = ledger::derive_tip(&self.path)? else {
            return Ok(None);
        };
        let cached = match self.tips.read() {
            Ok(cached) => cached,
            Err(e) => {
                warn!(ledger = %self.path.display(), error = %e, "tip cache unreadable");
                None
            }
        };
        if cached.as_deref() != Some(derived.as_str()) {
            warn!(
                ledger = %self.path.display(),
                cached = ?cached,
                derived = %derived,
                "tip cache disagrees with ledger, resetting it"
            );
            if let Err(e) = self.tips.write(&derived, self.clock.now()) {
                warn!(ledger = %self.path.display(), error = %e, "tip cache reset failed");
            }
        }
        Ok(Some(derived))
    }
}

/// If a previous append died mid-line, end that line so the next record
/// starts on its own line.  The fragment stays behind as a malformed line.
fn terminate_partial_line(path: &Path, file: &mut File) -> LedgerResult<()> {
    let len = file
        .metadata()
        .map_err(|e| write_error(path, "stat", e))?
        .len();
    if len == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .map_err(|e| write_error(path, "inspect", e))?;

    if last[0] != b'\n' {
        warn!(ledger = %path.display(), "ledger ends mid-line, terminating partial record");
        file.write_all(b"\n")
            .and_then(|_| file.sync_data())
            .map_err(|e| write_error(path, "terminate", e))?;
    }
    Ok(())
}

fn write_error(path: &Path, op: &str, e: std::io::Error) -> LedgerError {
    LedgerError::Write {
        reason: format!("failed to {} ledger '{}': {}", op, path.display(), e),
    }
}
