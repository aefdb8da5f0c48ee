//! Schema, access, and commit hand-off types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::Entries;

/// Caller identity used for authorization checks (160-bit account address).
pub type Address = [u8; 20];

/// Sentinel returned by mutating operations when the caller is not in the
/// table's authorized set. Negative so it can never collide with a row count;
/// the value crosses the precompiled-contract boundary and must not change.
pub const CODE_NO_AUTHORIZED: i32 = -50000;

/// Schema descriptor for one logical table.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name, used to address the backing store.
    #[builder(into)]
    pub name: String,
    /// Permitted field names. Writes carrying any other field are rejected.
    #[serde(default)]
    #[builder(default)]
    pub fields: Vec<String>,
    /// Caller identities allowed to mutate the table. Empty means open to
    /// all callers.
    #[serde(default)]
    #[builder(default)]
    pub authorized_addresses: Vec<Address>,
}

/// Per-operation access context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessOptions {
    /// Identity of the calling account.
    pub origin: Address,
    /// Whether the authority gate applies to this operation.
    pub check: bool,
}

impl AccessOptions {
    /// Options for `origin` with the authority gate enabled.
    pub fn new(origin: Address) -> Self {
        Self { origin, check: true }
    }

    /// Options that bypass the authority gate (system-internal callers).
    pub fn unchecked() -> Self {
        Self { origin: [0u8; 20], check: false }
    }
}

impl Default for AccessOptions {
    fn default() -> Self {
        Self { origin: [0u8; 20], check: true }
    }
}

/// Commit-time sink: every non-tombstoned `(key, bag)` of a table is appended
/// here by `dump` for the transaction manager to persist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    /// Name of the dumped table.
    pub table_name: String,
    /// Key-ordered bags collected from the overlay.
    pub data: BTreeMap<String, Entries>,
}

impl TableData {
    /// Creates an empty sink for `table_name`.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self { table_name: table_name.into(), data: BTreeMap::new() }
    }
}
