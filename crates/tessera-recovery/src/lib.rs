//! # tessera-recovery
//!
//! Backed-up recovery engine that rebuilds a self-consistent Tessera ledger.
//!
//! ## Overview
//!
//! [`RecoveryEngine::repair`] snapshots the ledger, relinks every record to
//! its predecessor, recomputes every hash, and writes the result back.  The
//! repaired ledger satisfies both chain invariants and audits clean.  What it
//! cannot do is restore the *original* content of a tampered record: it has
//! nothing to compare against.
//!
//! The writer must be stopped first; the engine takes the same exclusive lock
//! and fails with `LedgerError::Locked` otherwise.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_recovery::{RecoveryEngine, RepairOptions};
//! use tessera_store::FileTipStore;
//!
//! let engine = RecoveryEngine::new(Box::new(FileTipStore::for_ledger(path)), RepairOptions::default());
//! let report = engine.repair(path)?;
//! println!("{} modified, {} dropped, backup at {}",
//!     report.events_modified, report.events_dropped, report.backup_path.display());
//! ```

pub mod engine;

pub use engine::{RecoveryEngine, RepairOptions};

// ── Tests ─────────────────────────────────────────────────────────────────────
