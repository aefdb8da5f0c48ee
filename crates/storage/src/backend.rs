//! Backing persistent store abstraction.
//!
//! The overlay reads through a [`RemoteStore`] on the first touch of each
//! key. The store is addressed by `(block_hash, block_number, table, key)`
//! so historical block views resolve consistently. Writes never go through
//! this interface; the transaction manager persists the overlay via `dump`
//! at block commit.
//!
//! Implementations:
//! - [`MemoryRemoteStore`] (this crate) — in-memory `BTreeMap` for testing
//! - the AMOP/networked store on the production side

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use snafu::Snafu;

use chaintable_types::{Entries, Hash};

/// Errors surfaced by a backing store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// The store could not serve the select.
    #[snafu(display("backing store unavailable for table {table}: {message}"))]
    Unavailable {
        /// Table the select addressed.
        table: String,
        /// Failure description.
        message: String,
    },
}

/// Abstraction over the slower persistent key/multi-row store.
///
/// Implementations must be deterministic: the same `(block_hash,
/// block_number, table, key)` always resolves to the same rows.
pub trait RemoteStore: Send + Sync {
    /// Returns all historical and current rows for `key` at the given block
    /// view. `Ok(None)` is permitted and is treated as an empty bag.
    fn select(
        &self,
        block_hash: &Hash,
        block_number: u64,
        table: &str,
        key: &str,
    ) -> Result<Option<Entries>, StoreError>;
}

/// In-memory [`RemoteStore`] backed by a `BTreeMap`, for tests.
///
/// Tracks how many selects it has served so cache tests can assert on
/// fetch counts, and can be toggled into a failing mode to exercise the
/// overlay's error recovery.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    rows: RwLock<BTreeMap<(String, String), Entries>>,
    selects: AtomicU64,
    failing: AtomicBool,
}

impl MemoryRemoteStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with rows for `(table, key)`.
    ///
    /// Dirty flags are cleared on the way in: rows handed out by a backing
    /// store are committed state and must not contribute to the overlay
    /// digest until mutated.
    pub fn seed(&self, table: impl Into<String>, key: impl Into<String>, mut entries: Entries) {
        for index in 0..entries.size() {
            entries.get_mut(index).set_dirty(false);
        }
        entries.set_dirty(false);
        self.rows.write().insert((table.into(), key.into()), entries);
    }

    /// Number of selects served since construction.
    pub fn select_count(&self) -> u64 {
        self.selects.load(Ordering::Relaxed)
    }

    /// Makes every subsequent select fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn select(
        &self,
        _block_hash: &Hash,
        _block_number: u64,
        table: &str,
        key: &str,
    ) -> Result<Option<Entries>, StoreError> {
        self.selects.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable {
                table: table.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(self.rows.read().get(&(table.to_string(), key.to_string())).cloned())
    }
}
