//! Condition evaluation over a bag of rows.
//!
//! Returns the ascending indices of rows matching a conjunctive condition.
//! The empty condition matches every row, deleted ones included; any
//! predicate at all excludes deleted rows.

use tracing::warn;

use chaintable_types::{CompareOp, Condition, Entries, Entry, EntryStatus};

/// Returns the indices of rows in `entries` matching `condition`, ascending.
pub fn process_entries(entries: &Entries, condition: &Condition) -> Vec<usize> {
    let mut indexes = Vec::with_capacity(entries.size());
    if condition.is_empty() {
        indexes.extend(0..entries.size());
        return indexes;
    }

    for (index, entry) in entries.iter().enumerate() {
        if process_condition(entry, condition) {
            indexes.push(index);
        }
    }
    indexes
}

/// True when `entry` satisfies every predicate of `condition`.
fn process_condition(entry: &Entry, condition: &Condition) -> bool {
    for predicate in condition.predicates() {
        if entry.status() == EntryStatus::Deleted {
            return false;
        }

        let lhs = entry.get_field(&predicate.field);
        let rhs = predicate.rhs.as_str();

        let matched = match predicate.op {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
                match compare_numeric(predicate.op, lhs, rhs) {
                    Some(matched) => matched,
                    None => {
                        warn!(
                            field = %predicate.field,
                            lhs,
                            rhs,
                            "non-numeric value in ordered comparison, row skipped"
                        );
                        return false;
                    }
                }
            }
        };

        if !matched {
            return false;
        }
    }
    true
}

/// Compares both sides as decimal integers; the empty string reads as zero.
/// `None` on a parse failure.
fn compare_numeric(op: CompareOp, lhs: &str, rhs: &str) -> Option<bool> {
    let lhs = if lhs.is_empty() { "0" } else { lhs };
    let rhs = if rhs.is_empty() { "0" } else { rhs };

    let lhs: i64 = lhs.parse().ok()?;
    let rhs: i64 = rhs.parse().ok()?;

    Some(match op {
        CompareOp::Eq | CompareOp::Ne => unreachable!("string operators handled by caller"),
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Entry {
        let mut entry = Entry::new();
        for (name, value) in pairs {
            entry.set_field(*name, *value);
        }
        entry
    }

    fn bag(rows: Vec<Entry>) -> Entries {
        let mut entries = Entries::new();
        for entry in rows {
            entries.add_entry(entry);
        }
        entries
    }

    #[test]
    fn test_empty_condition_matches_all_including_deleted() {
        let mut deleted = row(&[("name", "bob")]);
        deleted.set_status(EntryStatus::Deleted);
        let entries = bag(vec![row(&[("name", "alice")]), deleted]);

        let indexes = process_entries(&entries, &Condition::new());
        assert_eq!(indexes, vec![0, 1]);
    }

    #[test]
    fn test_any_predicate_excludes_deleted() {
        let mut deleted = row(&[("name", "alice")]);
        deleted.set_status(EntryStatus::Deleted);
        let entries = bag(vec![deleted, row(&[("name", "alice")])]);

        let indexes = process_entries(&entries, &Condition::new().eq("name", "alice"));
        assert_eq!(indexes, vec![1]);
    }

    #[test]
    fn test_string_equality() {
        let entries = bag(vec![row(&[("name", "alice")]), row(&[("name", "bob")])]);

        assert_eq!(process_entries(&entries, &Condition::new().eq("name", "bob")), vec![1]);
        assert_eq!(process_entries(&entries, &Condition::new().ne("name", "bob")), vec![0]);
    }

    #[test]
    fn test_conjunction_short_circuits() {
        let entries = bag(vec![row(&[("name", "alice"), ("age", "30")])]);

        let both = Condition::new().eq("name", "alice").ge("age", "30");
        assert_eq!(process_entries(&entries, &both), vec![0]);

        let contradiction = Condition::new().eq("name", "bob").ge("age", "30");
        assert!(process_entries(&entries, &contradiction).is_empty());
    }

    #[test]
    fn test_numeric_comparisons() {
        let entries = bag(vec![row(&[("age", "9")]), row(&[("age", "30")])]);

        assert_eq!(process_entries(&entries, &Condition::new().gt("age", "10")), vec![1]);
        assert_eq!(process_entries(&entries, &Condition::new().le("age", "9")), vec![0]);
        assert_eq!(process_entries(&entries, &Condition::new().ge("age", "9")), vec![0, 1]);
        assert_eq!(process_entries(&entries, &Condition::new().lt("age", "30")), vec![0]);
    }

    #[test]
    fn test_empty_string_coerces_to_zero() {
        // A missing field reads as "", which compares as 0: 0 > 0 is false.
        let entries = bag(vec![row(&[("age", "")])]);
        assert!(process_entries(&entries, &Condition::new().gt("age", "")).is_empty());
        assert_eq!(process_entries(&entries, &Condition::new().ge("age", "")), vec![0]);
        assert_eq!(process_entries(&entries, &Condition::new().lt("age", "5")), vec![0]);
    }

    #[test]
    fn test_parse_failure_is_per_row_non_match() {
        let entries = bag(vec![row(&[("age", "not-a-number")]), row(&[("age", "42")])]);
        assert_eq!(process_entries(&entries, &Condition::new().gt("age", "10")), vec![1]);
    }

    #[test]
    fn test_negative_numbers() {
        let entries = bag(vec![row(&[("delta", "-5")]), row(&[("delta", "3")])]);
        assert_eq!(process_entries(&entries, &Condition::new().lt("delta", "0")), vec![0]);
    }
}
