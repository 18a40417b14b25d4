//! Persistence and side-effect edge for the Tally core.
//!
//! Three concerns live here, each behind a narrow surface:
//!
//! - [`MemoryStore`] - the unit-of-work store. Multi-entity writes run inside
//!   [`MemoryStore::in_transaction`], which commits all-or-nothing; rows are
//!   append-only where history matters (runs, exceptions, packs).
//! - [`ArtifactStore`] - the external blob store the pack artifact is
//!   uploaded to. Byte rendering and signed-URL mechanics stay outside the
//!   core; this is `put`/`sign` only.
//! - [`AuditSink`] - best-effort, hash-chained JSONL audit trail. A sink
//!   failure is surfaced to observability but never aborts the operation
//!   that triggered it.

pub mod artifact;
pub mod audit;
pub mod fingerprint;
pub mod memory;

pub use artifact::{put_with_retry, ArtifactStore, DirArtifactStore};
pub use audit::{verify_hash_chain, AuditRecord, AuditSink, ChainVerify, JsonlAuditSink, NullAuditSink};
pub use fingerprint::{canonical_json, import_fingerprint, sha256_hex};
pub use memory::{MemoryStore, StoreState};
