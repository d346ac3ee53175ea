//! Exclusive ledger lock.
//!
//! The ledger has exactly one writer.  `LedgerLock` makes that a checked
//! precondition: the writer holds it for its whole lifetime and the recovery
//! engine holds it for the duration of a repair.  A second holder gets
//! `LedgerError::Locked` immediately instead of blocking or forking the chain.
//!
//! The lock is an advisory `flock` on `<ledger>.lock`, released when the
//! guard is dropped.  Readers (the auditor) never take it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use tessera_contracts::error::{LedgerError, LedgerResult};

use crate::ledger::with_suffix;

/// RAII guard for the exclusive ledger lock.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Take the lock for `ledger`, failing fast if anyone else holds it.
    pub fn acquire(ledger: &Path) -> LedgerResult<Self> {
        let path = with_suffix(ledger, ".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| LedgerError::Write {
                reason: format!("failed to open lock file '{}': {}", path.display(), e),
            })?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(LedgerError::Locked {
                    path: ledger.to_path_buf(),
                });
            }
            return Err(LedgerError::Write {
                reason: format!("failed to lock '{}': {}", path.display(), e),
            });
        }

        debug!(lock = %path.display(), "ledger lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        // fs2::FileExt::unlock requires the trait in scope.
        let _ = FileExt::unlock(&self.file);
    }
}
