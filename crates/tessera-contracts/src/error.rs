//! Error types for the Tessera ledger.
//!
//! Every fallible operation returns `LedgerResult<T>`.  Chain anomalies
//! (broken links, content mismatches) are *not* errors: the auditor collects
//! them as data in an `AuditReport`.  The variants here are the conditions
//! under which an operation cannot proceed at all.

use std::path::PathBuf;

use thiserror::Error;

/// The unified error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A record could not be represented in the canonical wire format.
    #[error("encoding error: {reason}")]
    Encoding { reason: String },

    /// An append could not be durably committed to the ledger file.
    ///
    /// The writer never retries; retry policy belongs to the caller.
    #[error("ledger write failed: {reason}")]
    Write { reason: String },

    /// The ledger file could not be opened or read.
    #[error("ledger read failed: {reason}")]
    Read { reason: String },

    /// The pre-repair snapshot could not be taken.
    ///
    /// Fatal for a repair: nothing is rewritten without a backup.
    #[error("backup of '{}' failed: {reason}", path.display())]
    Backup { path: PathBuf, reason: String },

    /// A ledger line is not a parseable audit record.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Another writer or repair holds the ledger lock.
    #[error("ledger '{}' is locked by another writer", path.display())]
    Locked { path: PathBuf },

    /// The chain tip side-file could not be read or written.
    #[error("tip store error: {reason}")]
    TipStore { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Convenience alias used throughout the Tessera crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
