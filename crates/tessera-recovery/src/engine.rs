//! Ledger repair.
//!
//! Repair algorithm:
//!
//! 1. Take the exclusive ledger lock (no writer may be running).
//! 2. Copy the ledger to `<path>.backup_<unix_seconds>`.  No backup, no repair.
//! 3. Parse every line.  Unparsable lines are dropped with a warning, or abort
//!    the repair under `MalformedPolicy::Abort`.
//! 4. Fold over the records with a running tip that starts at genesis and
//!    resets at each reset marker already linked to genesis:
//!    a. force `prev_hash` to the running tip
//!    b. recompute `current_hash`
//!    c. advance the running tip
//! 5. Write the result to `<path>.repair.tmp`, fsync, rename over the ledger.
//! 6. Update the tip cache.
//!
//! Repair restores *structural* consistency.  A record whose payload was
//! edited before repair ran is re-hashed as-is and will audit clean from then
//! on; there is no independent copy of the original to restore from.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::AuditEvent,
    policy::MalformedPolicy,
    report::RepairReport,
};
use tessera_core::{
    canonical::compute_hash,
    ledger::{self, with_suffix},
    lock::LedgerLock,
    traits::{Clock, SystemClock, TipStore},
};

/// Tuning for `RecoveryEngine::repair`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOptions {
    pub on_malformed: MalformedPolicy,
}

/// Rewrites a ledger so that every link and every hash is consistent.
pub struct RecoveryEngine {
    tips: Box<dyn TipStore>,
    clock: Box<dyn Clock>,
    options: RepairOptions,
}

impl RecoveryEngine {
    pub fn new(tips: Box<dyn TipStore>, options: RepairOptions) -> Self {
        Self::with_clock(tips, Box::new(SystemClock), options)
    }

    pub fn with_clock(tips: Box<dyn TipStore>, clock: Box<dyn Clock>, options: RepairOptions) -> Self {
        Self {
            tips,
            clock,
            options,
        }
    }

    /// Repair the ledger at `path` in place.
    ///
    /// # Errors
    ///
    /// - `Locked` if a writer or another repair holds the ledger
    /// - `Backup` if the snapshot cannot be taken; the ledger is untouched
    /// - `MalformedRecord` under `MalformedPolicy::Abort`; the ledger is
    ///   untouched and the backup remains
    /// - `Read` / `Write` / `Encoding` on I/O or encoding failure; recover
    ///   from the backup, never from a partial output
    pub fn repair(&self, path: &Path) -> LedgerResult<RepairReport> {
        let _lock = LedgerLock::acquire(path)?;
        let started = self.clock.now();

        let backup_path = create_backup(path, started)?;
        info!(
            ledger = %path.display(),
            backup = %backup_path.display(),
            "pre-repair backup written"
        );

        let contents = fs::read(path).map_err(|e| LedgerError::Read {
            reason: format!("failed to read ledger '{}': {}", path.display(), e),
        })?;

        let mut records = Vec::new();
        let mut events_dropped = 0;
        for (line, parsed) in ledger::parse_lines(&contents) {
            match parsed {
                Ok(event) => records.push(event),
                Err(reason) => match self.options.on_malformed {
                    MalformedPolicy::Drop => {
                        warn!(line, reason = %reason, "dropping unparsable ledger line");
                        events_dropped += 1;
                    }
                    MalformedPolicy::Abort => {
                        return Err(LedgerError::MalformedRecord { line, reason });
                    }
                },
            }
        }

        let rebuilt = rebuild(records)?;
        rewrite(path, &rebuilt.events)?;

        if let Err(e) = self.tips.write(&rebuilt.tip, self.clock.now()) {
            warn!(
                ledger = %path.display(),
                error = %e,
                "ledger repaired but tip cache update failed"
            );
        }

        let report = RepairReport {
            events_total: rebuilt.events.len(),
            events_modified: rebuilt.modified,
            links_repaired: rebuilt.links,
            hashes_repaired: rebuilt.hashes,
            events_dropped,
            backup_path,
            final_tip: rebuilt.tip,
        };
        info!(
            ledger = %path.display(),
            total = report.events_total,
            modified = report.events_modified,
            dropped = report.events_dropped,
            final_tip = %report.final_tip,
            "ledger repaired"
        );
        Ok(report)
    }
}

/// Fold accumulator for `rebuild`.
struct Rebuild {
    tip: String,
    events: Vec<AuditEvent>,
    links: usize,
    hashes: usize,
    modified: usize,
}

/// Relink and rehash `records` in order.
fn rebuild(records: Vec<AuditEvent>) -> LedgerResult<Rebuild> {
    let start = Rebuild {
        tip: AuditEvent::GENESIS_HASH.to_string(),
        events: Vec::with_capacity(records.len()),
        links: 0,
        hashes: 0,
        modified: 0,
    };

    records.into_iter().try_fold(start, |mut acc, mut event| {
        if event.opens_epoch() {
            acc.tip = AuditEvent::GENESIS_HASH.to_string();
        }

        let mut changed = false;
        if event.prev_hash != acc.tip {
            debug!(action = %event.action, from = %event.prev_hash, to = %acc.tip, "relinking record");
            event.prev_hash = acc.tip.clone();
            acc.links += 1;
            changed = true;
        }

        let recomputed = compute_hash(&event)?;
        if recomputed != event.current_hash {
            debug!(action = %event.action, from = %event.current_hash, to = %recomputed, "rehashing record");
            event.current_hash = recomputed;
            acc.hashes += 1;
            changed = true;
        }

        if changed {
            acc.modified += 1;
        }
        acc.tip = event.current_hash.clone();
        acc.events.push(event);
        Ok(acc)
    })
}

/// Copy `path` to `<path>.backup_<unix_seconds>`, adding `.1`, `.2`, … if a
/// backup from the same second already exists.  The copy is fsynced and its
/// length checked before it is trusted.
fn create_backup(path: &Path, at: DateTime<Utc>) -> LedgerResult<PathBuf> {
    let backup_error = |reason: String| LedgerError::Backup {
        path: path.to_path_buf(),
        reason,
    };

    let base = with_suffix(path, &format!(".backup_{}", at.timestamp()));
    let backup = (0..)
        .map(|n| if n == 0 { base.clone() } else { with_suffix(&base, &format!(".{n}")) })
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| backup_error("no free backup name".to_string()))?;

    let expected = fs::metadata(path)
        .map_err(|e| backup_error(e.to_string()))?
        .len();
    let copied = fs::copy(path, &backup).map_err(|e| backup_error(e.to_string()))?;
    if copied != expected {
        return Err(backup_error(format!(
            "copied {copied} of {expected} bytes to '{}'",
            backup.display()
        )));
    }
    File::open(&backup)
        .and_then(|f| f.sync_all())
        .map_err(|e| backup_error(format!("failed to sync '{}': {}", backup.display(), e)))?;

    Ok(backup)
}

/// Replace the ledger with `events`, one record per line.
fn rewrite(path: &Path, events: &[AuditEvent]) -> LedgerResult<()> {
    let write_error = |e: std::io::Error| LedgerError::Write {
        reason: format!("failed to rewrite ledger '{}': {}", path.display(), e),
    };

    let mut out = String::new();
    for event in events {
        let line = serde_json::to_string(event).map_err(|e| LedgerError::Encoding {
            reason: format!("failed to serialize record: {}", e),
        })?;
        out.push_str(&line);
        out.push('\n');
    }

    let tmp = with_suffix(path, ".repair.tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(write_error)?;
    file.write_all(out.as_bytes()).map_err(write_error)?;
    file.sync_all().map_err(write_error)?;
    drop(file);

    fs::rename(&tmp, path).map_err(write_error)?;
    Ok(())
}
