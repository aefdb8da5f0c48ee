//! Transactional in-memory table layer for the chaintable storage stack.
//!
//! This crate provides the per-block overlay that buffers table writes in
//! memory between block start and block commit:
//!
//! - [`MemoryTable`] — the façade: select/insert/update/remove against the
//!   overlay, a deterministic digest of dirty state, `dump` at commit, and
//!   journal-driven `rollback` on revert
//! - [`KeyCache`] — lazy, concurrency-safe key → row-bag map with tombstone
//!   slots for rollback invalidation
//! - [`RemoteStore`] — read-through interface to the slower persistent
//!   store, with [`MemoryRemoteStore`] for tests
//! - condition evaluation over conjunctive field predicates

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cache;
mod evaluator;
mod table;

pub use backend::{MemoryRemoteStore, RemoteStore, StoreError};
pub use cache::{Fetch, KeyCache, SharedEntries};
pub use evaluator::process_entries;
pub use table::{MemoryTable, Recorder, TableError};
