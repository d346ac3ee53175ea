//! Repair policy types.
//!
//! Kept here rather than in the recovery crate so the configuration file can
//! name them without depending on the engine.

use serde::{Deserialize, Serialize};

/// What the recovery engine does with a line that is not a parseable record.
///
/// Expressed in TOML as a kebab-case string:
/// ```toml
/// on_malformed = "drop"
/// on_malformed = "abort"
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedPolicy {
    /// Leave the line out of the rewritten ledger and log a warning.
    #[default]
    Drop,
    /// Stop before rewriting anything.  The backup is still taken.
    Abort,
}
