//! # tessera-store
//!
//! Chain tip caches for the Tessera audit ledger.
//!
//! - [`FileTipStore`]: the JSON side-file used by the CLI
//! - [`InMemoryTipStore`]: a process-local cache
//!
//! Both implement [`TipStore`](tessera_core::traits::TipStore).  Neither is
//! authoritative: the auditor and the recovery engine derive the tip from the
//! ledger and only ever *write* the cache.

pub mod file;
pub mod memory;

pub use file::FileTipStore;
pub use memory::InMemoryTipStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
