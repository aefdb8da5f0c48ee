//! Block-scoped in-memory table overlay.
//!
//! A [`MemoryTable`] is created per table per block, bound to the block view
//! coordinates and the backing [`RemoteStore`]. Mutations touch only the
//! overlay and emit journal records through the bound recorder; the outer
//! transaction manager serializes the overlay via [`dump`](MemoryTable::dump)
//! at commit and drives [`rollback`](MemoryTable::rollback) on revert.
//!
//! Expected operational failures (schema violations, backing store errors,
//! condition parse errors) are recovered locally and logged; the numeric
//! return value is the only error channel the executor sees.

use std::sync::Arc;

use snafu::{ResultExt, Snafu};
use tracing::error;

use chaintable_types::{
    AccessOptions, Address, CODE_NO_AUTHORIZED, Change, ChangeKind, Condition, Entries, Entry,
    EntryStatus, Hash, ID_FIELD, Record, STATUS_FIELD, TableData, TableInfo, ValidationConfig,
    ZERO_HASH, sha256,
};

use crate::backend::{RemoteStore, StoreError};
use crate::cache::{Fetch, KeyCache, SharedEntries};
use crate::evaluator::process_entries;

/// Journal callback. Receives the table, the change kind, the key, and the
/// reversible records. Bound once via
/// [`set_recorder`](MemoryTable::set_recorder); invoked synchronously inside
/// the mutating operation. Must not call back into the same table.
pub type Recorder = Box<dyn Fn(&MemoryTable, ChangeKind, &str, &[Record]) + Send + Sync>;

/// Errors internal to table operations. Never crosses the public mutating
/// API, which folds failures into its numeric return value.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TableError {
    /// A written field is not part of the table schema.
    #[snafu(display("field {field:?} is not defined in table {table:?}"))]
    InvalidField {
        /// Table whose schema rejected the field.
        table: String,
        /// The offending field name.
        field: String,
    },

    /// A field name exceeds the configured byte limit.
    #[snafu(display("field name {field:?} is {len} bytes, limit is {max}"))]
    FieldNameTooLong {
        /// The offending field name.
        field: String,
        /// Actual byte length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// A field value exceeds the configured byte limit.
    #[snafu(display("value of field {field:?} is {len} bytes, limit is {max}"))]
    FieldValueTooLong {
        /// Field whose value is oversized.
        field: String,
        /// Actual byte length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// The backing store failed to serve a select.
    #[snafu(display("backing store select failed: {source}"))]
    Store {
        /// The underlying store error.
        source: StoreError,
    },
}

/// Write-buffering, rollback-capable, hashable overlay over the backing
/// store, holding one block's view of one logical table.
pub struct MemoryTable {
    remote: Option<Arc<dyn RemoteStore>>,
    info: Arc<TableInfo>,
    cache: KeyCache,
    block_hash: Hash,
    block_number: u64,
    recorder: Option<Recorder>,
    validation: ValidationConfig,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTable {
    /// Creates an unbound table. Callers configure it through the setters
    /// before first use.
    pub fn new() -> Self {
        Self {
            remote: None,
            info: Arc::new(TableInfo::default()),
            cache: KeyCache::new(),
            block_hash: ZERO_HASH,
            block_number: 0,
            recorder: None,
            validation: ValidationConfig::default(),
        }
    }

    /// Binds the backing store.
    pub fn set_state_storage(&mut self, remote: Arc<dyn RemoteStore>) {
        self.remote = Some(remote);
    }

    /// Sets the block hash of the view served to the backing store.
    pub fn set_block_hash(&mut self, block_hash: Hash) {
        self.block_hash = block_hash;
    }

    /// Sets the block number of the view served to the backing store.
    pub fn set_block_number(&mut self, block_number: u64) {
        self.block_number = block_number;
    }

    /// Sets the schema descriptor.
    pub fn set_table_info(&mut self, info: TableInfo) {
        self.info = Arc::new(info);
    }

    /// Binds the journal recorder.
    pub fn set_recorder(&mut self, recorder: Recorder) {
        self.recorder = Some(recorder);
    }

    /// Overrides the write validation limits.
    pub fn set_validation(&mut self, validation: ValidationConfig) {
        self.validation = validation;
    }

    /// The schema this table enforces.
    pub fn table_info(&self) -> &TableInfo {
        &self.info
    }

    /// Resolves `key` to its shared row bag, fetching from the backing store
    /// on first touch or after a rollback invalidated the slot.
    ///
    /// # Errors
    ///
    /// Propagates the backing store failure; the cache is left unchanged.
    pub fn select_cache(&self, key: &str, need_select: bool) -> Result<SharedEntries, StoreError> {
        match &self.remote {
            Some(remote) => {
                let fetch =
                    || remote.select(&self.block_hash, self.block_number, &self.info.name, key);
                let fetch: Fetch<'_> = &fetch;
                self.cache.select_cache(key, need_select, Some(fetch))
            }
            None => self.cache.select_cache(key, need_select, None),
        }
    }

    /// Returns the rows under `key` matching `condition`.
    ///
    /// Any failure yields an empty result and a log line; reads never
    /// propagate errors to the executor.
    pub fn select(&self, key: &str, condition: &Condition) -> Entries {
        match self.try_select(key, condition) {
            Ok(entries) => entries,
            Err(error) => {
                error!(table = %self.info.name, key, %error, "table select failed");
                Entries::new()
            }
        }
    }

    fn try_select(&self, key: &str, condition: &Condition) -> Result<Entries, TableError> {
        let bag = self.select_cache(key, true).context(StoreSnafu)?;
        let bag = bag.read();

        let mut result = Entries::new();
        for index in process_entries(&bag, condition) {
            result.add_entry(bag.get(index).clone());
        }
        Ok(result)
    }

    /// Applies the fields of `patch` to every row under `key` matching
    /// `condition`.
    ///
    /// Returns the number of rows modified, [`CODE_NO_AUTHORIZED`] when the
    /// authority gate rejects the caller, or 0 on an empty bag or any caught
    /// failure.
    pub fn update(
        &self,
        key: &str,
        patch: &Entry,
        condition: &Condition,
        options: &AccessOptions,
    ) -> i32 {
        if options.check && !self.check_authority(&options.origin) {
            return CODE_NO_AUTHORIZED;
        }

        match self.try_update(key, patch, condition) {
            Ok(count) => count,
            Err(error) => {
                error!(table = %self.info.name, key, %error, "table update failed");
                0
            }
        }
    }

    fn try_update(
        &self,
        key: &str,
        patch: &Entry,
        condition: &Condition,
    ) -> Result<i32, TableError> {
        let bag = self.select_cache(key, true).context(StoreSnafu)?;
        let mut guard = bag.write();
        if guard.is_empty() {
            return Ok(0);
        }

        self.check_field(patch)?;

        let indexes = process_entries(&guard, condition);
        let mut records = Vec::with_capacity(indexes.len() * patch.field_count());
        for &index in &indexes {
            let row = guard.get_mut(index);
            for (name, value) in patch.fields() {
                records.push(Record::with_field(index, name, row.get_field(name)));
                row.set_field(name, value);
            }
        }
        guard.set_dirty(true);
        drop(guard);

        self.record(ChangeKind::Update, key, &records);
        Ok(indexes.len() as i32)
    }

    /// Appends `entry` to the bag under `key`.
    ///
    /// Returns 1 on success, [`CODE_NO_AUTHORIZED`] when the authority gate
    /// rejects the caller, or 0 on any other caught failure. With
    /// `need_select` false the backing store is not consulted; the row lands
    /// in a fresh bag.
    pub fn insert(
        &self,
        key: &str,
        entry: Entry,
        options: &AccessOptions,
        need_select: bool,
    ) -> i32 {
        if options.check && !self.check_authority(&options.origin) {
            return CODE_NO_AUTHORIZED;
        }

        match self.try_insert(key, entry, need_select) {
            Ok(count) => count,
            Err(error) => {
                error!(table = %self.info.name, key, %error, "table insert failed");
                0
            }
        }
    }

    fn try_insert(&self, key: &str, entry: Entry, need_select: bool) -> Result<i32, TableError> {
        let bag = self.select_cache(key, need_select).context(StoreSnafu)?;
        self.check_field(&entry)?;

        // The journal record points at the position the new row will occupy.
        let index = bag.read().size();
        self.record(ChangeKind::Insert, key, &[Record::new(index)]);

        let mut guard = bag.write();
        let was_empty = guard.is_empty();
        guard.add_entry(entry);
        drop(guard);

        if was_empty {
            self.cache.insert_if_absent(key, &bag);
        }
        Ok(1)
    }

    /// Marks every row under `key` matching `condition` as deleted.
    ///
    /// Returns the number of rows marked, [`CODE_NO_AUTHORIZED`] when the
    /// authority gate rejects the caller, or 0 on any caught failure.
    pub fn remove(&self, key: &str, condition: &Condition, options: &AccessOptions) -> i32 {
        if options.check && !self.check_authority(&options.origin) {
            return CODE_NO_AUTHORIZED;
        }

        match self.try_remove(key, condition) {
            Ok(count) => count,
            Err(error) => {
                error!(table = %self.info.name, key, %error, "table remove failed");
                0
            }
        }
    }

    fn try_remove(&self, key: &str, condition: &Condition) -> Result<i32, TableError> {
        let bag = self.select_cache(key, true).context(StoreSnafu)?;
        let mut guard = bag.write();

        let indexes = process_entries(&guard, condition);
        let mut records = Vec::with_capacity(indexes.len());
        for &index in &indexes {
            guard.get_mut(index).set_status(EntryStatus::Deleted);
            records.push(Record::new(index));
        }
        guard.set_dirty(true);
        drop(guard);

        self.record(ChangeKind::Remove, key, &records);
        Ok(indexes.len() as i32)
    }

    /// Deterministic digest of the table's dirty content.
    ///
    /// Keys are walked in lexicographic byte order; within each dirty bag,
    /// dirty rows in positional order contribute their hash fields in field
    /// insertion order. A table with no dirty content digests to
    /// [`ZERO_HASH`].
    pub fn hash(&self) -> Hash {
        let mut data = Vec::new();
        for (key, slot) in self.cache.snapshot() {
            let Some(bag) = slot else { continue };
            let bag = bag.read();
            if !bag.dirty() {
                continue;
            }

            data.extend_from_slice(key.as_bytes());
            for entry in bag.iter() {
                if !entry.dirty() {
                    continue;
                }
                for (name, value) in entry.fields() {
                    if is_hash_field(name) {
                        data.extend_from_slice(name.as_bytes());
                        data.extend_from_slice(value.as_bytes());
                    }
                }
            }
        }

        if data.is_empty() {
            return ZERO_HASH;
        }
        sha256(&data)
    }

    /// Appends every non-tombstoned `(key, bag)` to `data`. Returns true
    /// when any appended bag is dirty, i.e. the table must be persisted.
    pub fn dump(&self, data: &mut TableData) -> bool {
        let mut dirty_table = false;
        for (key, slot) in self.cache.snapshot() {
            let Some(bag) = slot else { continue };
            let bag = bag.read();

            if bag.dirty() {
                dirty_table = true;
            }
            data.data.insert(key, bag.clone());
        }
        dirty_table
    }

    /// Undoes one journaled change.
    ///
    /// Rolling back an insert that leaves its bag empty tombstones the cache
    /// slot so the next read reloads from the backing store. Dirty flags are
    /// not cleared: dirtiness is monotonic within a block and the table is
    /// discarded after a revert.
    ///
    /// # Panics
    ///
    /// Panics when the change references a key with no live cache slot or an
    /// insert record that is not the last row; both are programmer errors in
    /// the journal, not recoverable states.
    pub fn rollback(&self, change: &Change) {
        match change.kind {
            ChangeKind::Insert => {
                let bag = self.expect_bag(change);
                let mut guard = bag.write();
                let index = change.records[0].index;
                assert_eq!(
                    index + 1,
                    guard.size(),
                    "insert rollback must target the last row of {:?}",
                    change.key
                );
                guard.remove_entry(index);
                let now_empty = guard.is_empty();
                drop(guard);

                if now_empty {
                    self.cache.tombstone(&change.key);
                }
            }
            ChangeKind::Update => {
                let bag = self.expect_bag(change);
                let mut guard = bag.write();
                for record in &change.records {
                    guard.get_mut(record.index).set_field(&record.field, &record.old_value);
                }
            }
            ChangeKind::Remove => {
                let bag = self.expect_bag(change);
                let mut guard = bag.write();
                for record in &change.records {
                    guard.get_mut(record.index).set_status(EntryStatus::Live);
                }
            }
            ChangeKind::Select => {}
        }
    }

    fn expect_bag(&self, change: &Change) -> SharedEntries {
        match self.cache.bag(&change.key) {
            Some(bag) => bag,
            None => panic!(
                "rollback of {:?} for key {:?} with no live cache slot",
                change.kind, change.key
            ),
        }
    }

    /// Drops every cache slot.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// True when every cache slot is a tombstone. A slot holding a bag of
    /// zero rows still counts as occupied.
    pub fn empty(&self) -> bool {
        self.cache.all_tombstones()
    }

    /// Number of cache slots, tombstones included.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// True when `origin` may mutate this table: the authorized set is empty
    /// (open table) or contains `origin`.
    pub fn check_authority(&self, origin: &Address) -> bool {
        self.info.authorized_addresses.is_empty()
            || self.info.authorized_addresses.contains(origin)
    }

    /// Validates every field of `entry` against the schema and the byte
    /// limits before any write is applied. The implicit `_id_` field is
    /// exempt.
    fn check_field(&self, entry: &Entry) -> Result<(), TableError> {
        for (name, value) in entry.fields() {
            if name == ID_FIELD {
                continue;
            }
            if !self.info.fields.iter().any(|field| field == name) {
                return InvalidFieldSnafu { table: self.info.name.clone(), field: name }.fail();
            }
            if name.len() > self.validation.max_field_name_bytes {
                return FieldNameTooLongSnafu {
                    field: name,
                    len: name.len(),
                    max: self.validation.max_field_name_bytes,
                }
                .fail();
            }
            if value.len() > self.validation.max_field_value_bytes {
                return FieldValueTooLongSnafu {
                    field: name,
                    len: value.len(),
                    max: self.validation.max_field_value_bytes,
                }
                .fail();
            }
        }
        Ok(())
    }

    fn record(&self, kind: ChangeKind, key: &str, records: &[Record]) {
        if let Some(recorder) = &self.recorder {
            recorder(self, kind, key, records);
        }
    }
}

/// True for fields that contribute to the table digest: any name not wrapped
/// in underscores, plus the status field itself.
fn is_hash_field(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    (!name.starts_with('_') && !name.ends_with('_')) || name == STATUS_FIELD
}
