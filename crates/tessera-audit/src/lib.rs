//! # tessera-audit
//!
//! Read-only integrity auditor for the Tessera hash-chained ledger.
//!
//! ## Overview
//!
//! [`Auditor`] walks a ledger once, front to back, and returns an
//! [`AuditReport`](tessera_contracts::report::AuditReport) listing every
//! LINK, CONTENT, and MALFORMED anomaly with its line number.  It never
//! writes, never takes the writer lock, and never trusts the tip cache, so it
//! is safe to run while a writer is appending.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_audit::{Auditor, AuditOptions};
//!
//! let report = Auditor::new(AuditOptions::default()).audit_path(path)?;
//! for anomaly in &report.anomalies {
//!     println!("{anomaly}");
//! }
//! ```

pub mod auditor;

pub use auditor::{audit_bytes, audit_records, AuditOptions, Auditor};

// ── Tests ─────────────────────────────────────────────────────────────────────
