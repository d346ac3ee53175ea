//! # tessera-core
//!
//! Canonical encoding, hash chaining, and the append-only writer for the
//! Tessera audit ledger.
//!
//! This crate provides:
//! - The trait seams (`TipStore`, `Clock`)
//! - The canonical encoder every hash goes through (`canonical`)
//! - Line-level access to the ledger file (`ledger`)
//! - The single-writer lock (`lock`) and the append engine (`ChainWriter`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_core::ChainWriter;
//! use tessera_store::FileTipStore;
//!
//! let tips = FileTipStore::for_ledger("audit/ledger.jsonl");
//! let mut writer = ChainWriter::open("audit/ledger.jsonl", Box::new(tips))?;
//! writer.initialize(serde_json::Map::new())?;
//! writer.append("user_login", "auth", details, false)?;
//! ```

pub mod canonical;
pub mod ledger;
pub mod lock;
pub mod traits;
pub mod writer;

pub use canonical::{compute_hash, encode, hash_bytes, to_details};
pub use lock::LedgerLock;
pub use traits::{Clock, SystemClock, TipStore};
pub use writer::ChainWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
