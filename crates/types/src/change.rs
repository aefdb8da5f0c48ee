//! Change journal records.
//!
//! Every mutating table operation emits one [`Change`] through the bound
//! recorder callback. The table does not keep the journal itself; the outer
//! transaction manager owns it and feeds the changes back through
//! `rollback()` on block revert.

use serde::{Deserialize, Serialize};

/// Kind of a journaled mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A row was appended; rollback removes it again.
    Insert,
    /// Row fields were overwritten; rollback restores the old values.
    Update,
    /// Rows were marked deleted; rollback flips them back to live.
    Remove,
    /// Reserved; rollback is a no-op.
    Select,
}

/// One reversible step inside a [`Change`].
///
/// Updates carry `(index, field, old_value)`; inserts and removes carry the
/// row index alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position of the affected row within its bag.
    pub index: usize,
    /// Field name for update records, empty otherwise.
    pub field: String,
    /// Previous field value for update records, empty otherwise.
    pub old_value: String,
}

impl Record {
    /// Record referencing a row position alone (insert and remove).
    pub fn new(index: usize) -> Self {
        Self { index, ..Self::default() }
    }

    /// Record capturing the pre-update value of one field.
    pub fn with_field(
        index: usize,
        field: impl Into<String>,
        old_value: impl Into<String>,
    ) -> Self {
        Self { index, field: field.into(), old_value: old_value.into() }
    }
}

/// A journaled mutation against one key of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// What kind of mutation this was.
    pub kind: ChangeKind,
    /// Key whose bag was mutated.
    pub key: String,
    /// The reversible steps, in application order.
    pub records: Vec<Record>,
}

impl Change {
    /// Creates a change for `key` with the given records.
    pub fn new(kind: ChangeKind, key: impl Into<String>, records: Vec<Record>) -> Self {
        Self { kind, key: key.into(), records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_record() {
        let record = Record::new(3);
        assert_eq!(record.index, 3);
        assert!(record.field.is_empty());
        assert!(record.old_value.is_empty());
    }

    #[test]
    fn test_field_record() {
        let record = Record::with_field(0, "age", "30");
        assert_eq!(record.index, 0);
        assert_eq!(record.field, "age");
        assert_eq!(record.old_value, "30");
    }
}
