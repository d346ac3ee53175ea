//! In-memory implementation of `TipStore`.
//!
//! `InMemoryTipStore` keeps the tip behind an `Arc<Mutex<_>>`, so clones
//! share one cache.  Useful for embedding the writer where no side-file is
//! wanted, and for observing what the writer or the recovery engine cached.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    event::ChainTip,
};
use tessera_core::traits::TipStore;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTipStore {
    state: Arc<Mutex<Option<ChainTip>>>,
}

impl InMemoryTipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full cached record, if any.
    pub fn snapshot(&self) -> Option<ChainTip> {
        self.state.lock().ok().and_then(|tip| tip.clone())
    }
}

impl TipStore for InMemoryTipStore {
    fn read(&self) -> LedgerResult<Option<String>> {
        let state = self.state.lock().map_err(|e| LedgerError::TipStore {
            reason: format!("tip state lock poisoned: {}", e),
        })?;
        Ok(state.as_ref().map(|tip| tip.last_hash.clone()))
    }

    fn write(&self, hash: &str, at: DateTime<Utc>) -> LedgerResult<()> {
        let mut state = self.state.lock().map_err(|e| LedgerError::TipStore {
            reason: format!("tip state lock poisoned: {}", e),
        })?;
        *state = Some(ChainTip {
            last_hash: hash.to_string(),
            timestamp: at.timestamp_micros() as f64 / 1_000_000.0,
            datetime: at.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        Ok(())
    }
}
