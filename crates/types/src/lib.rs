//! Core types for the chaintable storage stack.
//!
//! This crate provides the foundational types shared by the table overlay
//! and its callers:
//! - Row types ([`Entry`], [`Entries`]) with dirty tracking
//! - Condition predicates ([`Condition`], [`CompareOp`])
//! - Change journal records ([`Change`], [`Record`])
//! - Schema and access types ([`TableInfo`], [`AccessOptions`])
//! - SHA-256 hashing primitives
//! - Validation configuration

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod change;
pub mod condition;
pub mod config;
pub mod entry;
pub mod hash;
pub mod types;

// Re-export commonly used types at crate root
pub use change::{Change, ChangeKind, Record};
pub use condition::{CompareOp, Condition, Predicate};
pub use config::{ConfigError, ValidationConfig};
pub use entry::{Entries, Entry, EntryStatus, ID_FIELD, STATUS_FIELD};
pub use hash::{Hash, ZERO_HASH, sha256};
pub use types::{AccessOptions, Address, CODE_NO_AUTHORIZED, TableData, TableInfo};
