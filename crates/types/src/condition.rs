//! Condition predicates for filtering rows.
//!
//! A [`Condition`] is a conjunction of `(field, op, rhs)` predicates. The
//! empty condition matches every row, deleted ones included; callers that
//! need liveness must supply at least one predicate.

use serde::{Deserialize, Serialize};

/// Comparison operator for a single predicate.
///
/// `Eq`/`Ne` compare strings byte-wise; the ordered operators compare both
/// sides as decimal integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// String equality.
    Eq,
    /// String inequality.
    Ne,
    /// Numeric greater-than.
    Gt,
    /// Numeric greater-or-equal.
    Ge,
    /// Numeric less-than.
    Lt,
    /// Numeric less-or-equal.
    Le,
}

/// A single field predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field name the predicate reads.
    pub field: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Right-hand side value.
    pub rhs: String,
}

/// Conjunction of field predicates, kept in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    predicates: Vec<Predicate>,
}

impl Condition {
    /// Creates the empty condition (matches all rows).
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: impl Into<String>, op: CompareOp, rhs: impl Into<String>) -> Self {
        self.predicates.push(Predicate { field: field.into(), op, rhs: rhs.into() });
        self
    }

    /// Requires `field == rhs` (string compare).
    pub fn eq(self, field: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.push(field, CompareOp::Eq, rhs)
    }

    /// Requires `field != rhs` (string compare).
    pub fn ne(self, field: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.push(field, CompareOp::Ne, rhs)
    }

    /// Requires `field > rhs` numerically.
    pub fn gt(self, field: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.push(field, CompareOp::Gt, rhs)
    }

    /// Requires `field >= rhs` numerically.
    pub fn ge(self, field: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.push(field, CompareOp::Ge, rhs)
    }

    /// Requires `field < rhs` numerically.
    pub fn lt(self, field: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.push(field, CompareOp::Lt, rhs)
    }

    /// Requires `field <= rhs` numerically.
    pub fn le(self, field: impl Into<String>, rhs: impl Into<String>) -> Self {
        self.push(field, CompareOp::Le, rhs)
    }

    /// True when no predicates have been added.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// The predicates in insertion order.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}
