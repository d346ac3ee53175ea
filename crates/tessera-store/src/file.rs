//! JSON side-file implementation of `TipStore`.
//!
//! The side-file holds a single `ChainTip` object:
//!
//! ```json
//! {"last_hash":"…64 hex…","timestamp":1700000000.25,"datetime":"2023-11-14T22:13:20.250000Z"}
//! ```
//!
//! Writes go to `<tip>.tmp` first and are renamed into place, so a reader
//! sees either the old tip or the new one, never a torn file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::{is_valid_hash, ChainTip},
};
use tessera_core::{ledger::with_suffix, traits::TipStore};

/// A `TipStore` persisted as a small JSON file next to the ledger.
#[derive(Debug, Clone)]
pub struct FileTipStore {
    path: PathBuf,
}

impl FileTipStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional side-file for `ledger`: `<ledger>.tip`.
    pub fn for_ledger(ledger: impl AsRef<Path>) -> Self {
        Self::new(with_suffix(ledger.as_ref(), ".tip"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full side-record.
    ///
    /// Returns `Ok(None)` if the file does not exist and
    /// `LedgerError::TipStore` if it exists but is not a valid tip.
    pub fn read_tip(&self) -> LedgerResult<Option<ChainTip>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LedgerError::TipStore {
                    reason: format!("failed to read '{}': {}", self.path.display(), e),
                })
            }
        };

        let tip: ChainTip = serde_json::from_str(&contents).map_err(|e| LedgerError::TipStore {
            reason: format!("'{}' is not a valid tip record: {}", self.path.display(), e),
        })?;

        if !is_valid_hash(&tip.last_hash) {
            return Err(LedgerError::TipStore {
                reason: format!(
                    "'{}' holds '{}', which is not a 64-character hex hash",
                    self.path.display(),
                    tip.last_hash
                ),
            });
        }
        Ok(Some(tip))
    }
}

impl TipStore for FileTipStore {
    fn read(&self) -> LedgerResult<Option<String>> {
        Ok(self.read_tip()?.map(|tip| tip.last_hash))
    }

    fn write(&self, hash: &str, at: DateTime<Utc>) -> LedgerResult<()> {
        let tip = ChainTip {
            last_hash: hash.to_string(),
            timestamp: at.timestamp_micros() as f64 / 1_000_000.0,
            datetime: at.to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        let json = serde_json::to_string(&tip).map_err(|e| LedgerError::TipStore {
            reason: format!("failed to serialize tip: {}", e),
        })?;

        let tmp = with_suffix(&self.path, ".tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| LedgerError::TipStore {
                reason: format!("failed to write '{}': {}", self.path.display(), e),
            })?;

        debug!(tip = %self.path.display(), last_hash = %hash, "tip cache updated");
        Ok(())
    }
}
