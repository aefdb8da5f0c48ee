//! Row types for the in-memory table overlay.
//!
//! An [`Entry`] is a single row: named string fields plus a live/deleted
//! status and a dirty flag. [`Entries`] is the ordered, append-only bag of
//! rows sharing one key.
//!
//! Field iteration order is insertion order. The table digest walks fields in
//! this order, so it must be identical on every node for the same write
//! sequence; a hash map here would fork the chain.

use serde::{Deserialize, Serialize};

/// Implicit row identifier field, exempt from schema validation.
pub const ID_FIELD: &str = "_id_";

/// Status field name. The only underscore-wrapped field that contributes to
/// the table digest.
pub const STATUS_FIELD: &str = "_status_";

/// Row status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Row is visible to condition evaluation.
    #[default]
    Live = 0,
    /// Row has been removed within this block; kept in place for rollback.
    Deleted = 1,
}

/// A single row: an insertion-ordered field map plus status and dirty flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    fields: Vec<(String, String)>,
    status: EntryStatus,
    dirty: bool,
}

impl Entry {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `name`, or `""` if the field is absent.
    pub fn get_field(&self, name: &str) -> &str {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// Sets `name` to `value` and marks the row dirty.
    ///
    /// An existing field is overwritten in place, keeping its position in the
    /// iteration order.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
        self.dirty = true;
    }

    /// Returns the row status.
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Sets the row status and marks the row dirty.
    pub fn set_status(&mut self, status: EntryStatus) {
        self.status = status;
        self.dirty = true;
    }

    /// True once any field write or status change has touched this row.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Overrides the dirty flag. Backing stores clear it on rows they hand
    /// out so freshly loaded rows do not contribute to the digest.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of fields in the row.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Ordered, append-only bag of rows sharing one key.
///
/// The bag carries its own dirty flag, set independently of row dirtiness:
/// any add, update, or status flip inside the bag marks it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entries {
    entries: Vec<Entry>,
    dirty: bool,
}

impl Entries {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row and marks the bag dirty.
    pub fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.dirty = true;
    }

    /// Returns the row at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; callers only hold indices produced
    /// by condition evaluation or the change journal.
    pub fn get(&self, index: usize) -> &Entry {
        &self.entries[index]
    }

    /// Returns the row at `index` mutably. Panics like [`get`](Self::get).
    pub fn get_mut(&mut self, index: usize) -> &mut Entry {
        &mut self.entries[index]
    }

    /// Removes the row at `index`. Used only when rolling back an insert, in
    /// which case the index is the last position.
    pub fn remove_entry(&mut self, index: usize) {
        self.entries.remove(index);
    }

    /// Number of rows, deleted rows included.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// True when the bag holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once any contained row has been added, updated, or status-flipped.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Overrides the bag dirty flag.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Iterates the rows in positional order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}
