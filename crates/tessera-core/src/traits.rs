//! Trait seams for the ledger.
//!
//! - `TipStore` caches the hash of the most recent record
//! - `Clock` supplies the wall-clock instant stamped on each record
//!
//! The writer and the recovery engine take both as trait objects so tests can
//! pin time and inspect the cache without touching the filesystem.

use chrono::{DateTime, Utc};

use tessera_contracts::error::LedgerResult;

/// A cache of the chain tip.
///
/// Implementations are a convenience for the writer only.  The auditor and
/// the recovery engine always derive the tip from the ledger itself, so a
/// stale or missing cache can never make a broken chain look valid.
pub trait TipStore: Send + Sync {
    /// Return the cached tip hash, or `None` if nothing has been cached.
    fn read(&self) -> LedgerResult<Option<String>>;

    /// Replace the cached tip.
    fn write(&self, hash: &str, at: DateTime<Utc>) -> LedgerResult<()>;
}

/// Source of the instant stamped on appended records.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// `Clock` backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
