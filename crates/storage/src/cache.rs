//! Lazy key-scoped cache over the backing store.
//!
//! Each key maps to a slot holding the shared bag of rows loaded for it.
//! A slot set to `None` is a tombstone: a rollback has invalidated the
//! previous load and the next read must go back to the backing store. The
//! tombstone encoding (rather than erasing the key) keeps slot removal off
//! the concurrent read path; `clear()` is the only bulk erase.
//!
//! Two load paths:
//! - First touch misses the map entirely and fetches without any lock.
//!   Concurrent duplicate fetches are allowed; the first insert wins and
//!   later callers adopt the winner.
//! - A tombstone hit takes the reload mutex, re-checks the slot, and only
//!   then fetches, so a reloaded bag cannot be lost to a concurrent
//!   invalidation.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as Slot;
use parking_lot::{Mutex, RwLock};

use chaintable_types::Entries;

use crate::backend::StoreError;

/// A bag of rows shared between the cache, in-flight operations, and the
/// change journal's rollback path.
pub type SharedEntries = Arc<RwLock<Entries>>;

/// Fetch callback resolving a key against the backing store at the table's
/// block view. `None` means the table has no store bound.
pub type Fetch<'a> = &'a dyn Fn() -> Result<Option<Entries>, StoreError>;

fn share(entries: Entries) -> SharedEntries {
    Arc::new(RwLock::new(entries))
}

/// Concurrency-safe map from key to loaded row bag, with tombstone slots.
#[derive(Debug, Default)]
pub struct KeyCache {
    slots: DashMap<String, Option<SharedEntries>>,
    reload_lock: Mutex<()>,
}

impl KeyCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `key` to its row bag, loading from the backing store on
    /// first touch or after a tombstone.
    ///
    /// Returns a freshly allocated empty bag, without inserting it, when no
    /// store is bound or `need_select` is false and the key is unloaded.
    ///
    /// # Errors
    ///
    /// Propagates the fetch error when the backing store fails; the cache is
    /// left unchanged in that case.
    pub fn select_cache(
        &self,
        key: &str,
        need_select: bool,
        fetch: Option<Fetch<'_>>,
    ) -> Result<SharedEntries, StoreError> {
        if let Some(slot) = self.slots.get(key) {
            if let Some(bag) = slot.value() {
                return Ok(Arc::clone(bag));
            }
            drop(slot);
            if need_select {
                if let Some(fetch) = fetch {
                    let _guard = self.reload_lock.lock();
                    // Re-check under the lock: another thread may have
                    // reloaded the slot while we waited.
                    if let Some(slot) = self.slots.get(key) {
                        if let Some(bag) = slot.value() {
                            return Ok(Arc::clone(bag));
                        }
                    }
                    let bag = share(fetch()?.unwrap_or_default());
                    self.slots.insert(key.to_string(), Some(Arc::clone(&bag)));
                    return Ok(bag);
                }
            }
            return Ok(share(Entries::new()));
        }

        if need_select {
            if let Some(fetch) = fetch {
                let fetched = share(fetch()?.unwrap_or_default());
                let bag = match self.slots.entry(key.to_string()) {
                    Slot::Occupied(mut occupied) => match occupied.get() {
                        Some(winner) => Arc::clone(winner),
                        None => {
                            occupied.insert(Some(Arc::clone(&fetched)));
                            fetched
                        }
                    },
                    Slot::Vacant(vacant) => {
                        vacant.insert(Some(Arc::clone(&fetched)));
                        fetched
                    }
                };
                return Ok(bag);
            }
        }

        Ok(share(Entries::new()))
    }

    /// Publishes `bag` for `key` unless any slot (tombstone included) is
    /// already present. Used by insert when it created the first row of a
    /// bag that was never cached.
    pub fn insert_if_absent(&self, key: &str, bag: &SharedEntries) {
        if let Slot::Vacant(vacant) = self.slots.entry(key.to_string()) {
            vacant.insert(Some(Arc::clone(bag)));
        }
    }

    /// Returns the non-tombstone bag for `key`, if one is cached.
    pub fn bag(&self, key: &str) -> Option<SharedEntries> {
        self.slots.get(key).and_then(|slot| slot.value().as_ref().map(Arc::clone))
    }

    /// Marks `key` invalid: the next read must reload from the backing
    /// store.
    pub fn tombstone(&self, key: &str) {
        self.slots.insert(key.to_string(), None);
    }

    /// Key-ordered copy of all slots. Iteration over live shards is racy in
    /// general; callers invoke this at quiescent points (hash, dump).
    pub fn snapshot(&self) -> BTreeMap<String, Option<SharedEntries>> {
        self.slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().as_ref().map(Arc::clone)))
            .collect()
    }

    /// True when every slot is a tombstone. A slot holding an empty bag
    /// still counts as occupied.
    pub fn all_tombstones(&self) -> bool {
        self.slots.iter().all(|slot| slot.value().is_none())
    }

    /// Number of slots, tombstones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no key has ever been touched (or after `clear`).
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every slot.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use chaintable_types::Entry;

    use super::*;

    fn one_row_bag(value: &str) -> Entries {
        let mut entry = Entry::new();
        entry.set_field("v", value);
        let mut entries = Entries::new();
        entries.add_entry(entry);
        entries
    }

    #[test]
    fn test_first_touch_fetches_once() {
        let cache = KeyCache::new();
        let fetches = AtomicU64::new(0);
        let fetch = || {
            fetches.fetch_add(1, Ordering::Relaxed);
            Ok(Some(one_row_bag("1")))
        };

        let first = cache.select_cache("k", true, Some(&fetch)).unwrap();
        let second = cache.select_cache("k", true, Some(&fetch)).unwrap();

        assert_eq!(fetches.load(Ordering::Relaxed), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_miss_caches_empty_bag() {
        let cache = KeyCache::new();
        let fetch = || Ok(None);

        let bag = cache.select_cache("k", true, Some(&fetch)).unwrap();
        assert!(bag.read().is_empty());
        assert_eq!(cache.len(), 1);
        assert!(!cache.all_tombstones());
    }

    #[test]
    fn test_unbound_store_does_not_cache() {
        let cache = KeyCache::new();
        let bag = cache.select_cache("k", true, None).unwrap();
        assert!(bag.read().is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_need_select_false_does_not_fetch() {
        let cache = KeyCache::new();
        let fetches = AtomicU64::new(0);
        let fetch = || {
            fetches.fetch_add(1, Ordering::Relaxed);
            Ok(Some(one_row_bag("1")))
        };

        let bag = cache.select_cache("k", false, Some(&fetch)).unwrap();
        assert!(bag.read().is_empty());
        assert_eq!(fetches.load(Ordering::Relaxed), 0);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_tombstone_forces_reload() {
        let cache = KeyCache::new();
        let fetches = AtomicU64::new(0);
        let fetch = || {
            fetches.fetch_add(1, Ordering::Relaxed);
            Ok(Some(one_row_bag("1")))
        };

        cache.select_cache("k", true, Some(&fetch)).unwrap();
        cache.tombstone("k");
        assert!(cache.all_tombstones());

        let reloaded = cache.select_cache("k", true, Some(&fetch)).unwrap();
        assert_eq!(fetches.load(Ordering::Relaxed), 2);
        assert_eq!(reloaded.read().size(), 1);
        assert!(!cache.all_tombstones());
    }

    #[test]
    fn test_tombstone_without_store_stays_invalid() {
        let cache = KeyCache::new();
        cache.tombstone("k");

        let bag = cache.select_cache("k", true, None).unwrap();
        assert!(bag.read().is_empty());
        assert!(cache.all_tombstones());
    }

    #[test]
    fn test_fetch_error_leaves_cache_unchanged() {
        let cache = KeyCache::new();
        let fetch = || {
            Err(StoreError::Unavailable {
                table: "t".to_string(),
                message: "down".to_string(),
            })
        };

        assert!(cache.select_cache("k", true, Some(&fetch)).is_err());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insert_if_absent_keeps_first_winner() {
        let cache = KeyCache::new();
        let first = share(one_row_bag("first"));
        let second = share(one_row_bag("second"));

        cache.insert_if_absent("k", &first);
        cache.insert_if_absent("k", &second);

        let cached = cache.bag("k").unwrap();
        assert!(Arc::ptr_eq(&cached, &first));
    }

    #[test]
    fn test_insert_if_absent_does_not_resurrect_tombstone() {
        let cache = KeyCache::new();
        cache.tombstone("k");
        cache.insert_if_absent("k", &share(one_row_bag("late")));
        assert!(cache.all_tombstones());
    }

    #[test]
    fn test_clear() {
        let cache = KeyCache::new();
        let fetch = || Ok(Some(one_row_bag("1")));
        cache.select_cache("k", true, Some(&fetch)).unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
    }
}
