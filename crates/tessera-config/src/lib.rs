//! # tessera-config
//!
//! TOML configuration for the Tessera ledger tools.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use tessera_config::TesseraConfig;
//!
//! let config = TesseraConfig::load(Some(Path::new("tessera.toml")))?;
//! let ledger = config.resolve_ledger(None)?;
//! let tip = config.tip_path_for(&ledger);
//! ```

pub mod config;

pub use config::{AuditSection, LedgerSection, RepairSection, TesseraConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────
