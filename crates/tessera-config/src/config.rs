//! Configuration schema and loading.
//!
//! Every field is optional; a missing file or an empty document yields the
//! defaults.
//!
//! ```toml
//! [ledger]
//! path = "audit/ledger.jsonl"
//! tip_path = "audit/ledger.jsonl.tip"
//!
//! [audit]
//! pending_retry_ms = 200
//!
//! [repair]
//! on_malformed = "drop"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tessera_contracts::{
    error::{LedgerError, LedgerResult},
    policy::MalformedPolicy,
};
use tessera_core::ledger::with_suffix;

/// Where the ledger and its tip cache live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerSection {
    /// Ledger used when a command is not given one explicitly.
    pub path: Option<PathBuf>,

    /// Tip side-file for `path`.  Defaults to `<ledger>.tip`.  Only valid
    /// together with `path`.
    pub tip_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    /// Wait before re-reading a half-written last line.  `0` disables.
    pub pending_retry_ms: u64,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            pending_retry_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepairSection {
    pub on_malformed: MalformedPolicy,
}

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TesseraConfig {
    pub ledger: LedgerSection,
    pub audit: AuditSection,
    pub repair: RepairSection,
}

impl TesseraConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `LedgerError::Config` if the TOML is malformed, has keys the
    /// schema does not know, or sets `ledger.tip_path` without `ledger.path`.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check combinations the schema alone cannot express.
    pub fn validate(&self) -> LedgerResult<()> {
        if let (None, Some(tip)) = (&self.ledger.path, &self.ledger.tip_path) {
            return Err(LedgerError::Config {
                reason: format!(
                    "[ledger] tip_path = '{}' requires [ledger] path",
                    tip.display()
                ),
            });
        }
        Ok(())
    }

    /// Read and parse the file at `path`.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        debug!(config = %path.display(), "loaded configuration");
        Self::from_toml_str(&contents)
    }

    /// Load `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> LedgerResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Pick the ledger: an explicit path wins over `ledger.path`.
    pub fn resolve_ledger(&self, explicit: Option<&Path>) -> LedgerResult<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.ledger.path.clone())
            .ok_or_else(|| LedgerError::Config {
                reason: "no ledger path given and none configured under [ledger] path".to_string(),
            })
    }

    /// Tip side-file for `ledger`.
    ///
    /// `ledger.tip_path` only applies to the configured ledger; any other
    /// ledger gets its own `<ledger>.tip`.
    pub fn tip_path_for(&self, ledger: &Path) -> PathBuf {
        match (&self.ledger.path, &self.ledger.tip_path) {
            (Some(configured), Some(tip)) if configured == ledger => tip.clone(),
            _ => with_suffix(ledger, ".tip"),
        }
    }

    /// `audit.pending_retry_ms` as an optional delay.
    pub fn pending_retry(&self) -> Option<Duration> {
        match self.audit.pending_retry_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
