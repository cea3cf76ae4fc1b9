#![forbid(unsafe_code)]

//! Change classification: turning a mutation into an ordered record batch.
//!
//! # Design
//!
//! Two sources of change exist and each has its own rule set:
//!
//! - **Structural** mutations ([`Operation`]) are positionally destructive.
//!   They are reported as deletes and creates only, never as updates, even
//!   when the same index holds a different value afterwards.
//! - **Reconciled** mutations (direct index or length assignment discovered
//!   by diffing) are substitutive. A changed value at an index present in both
//!   snapshots is an update; growth is creates; truncation is deletes.
//!
//! Neither path attempts a minimal edit script. The output is always
//! replayable: [`apply_records`](crate::apply_records) on the old contents
//! yields the new contents.
//!
//! # Ordering
//!
//! | Source      | Batch order                                                   |
//! |-------------|---------------------------------------------------------------|
//! | splice      | deletes (descending index), then creates (ascending)          |
//! | reverse/sort| deletes for every old index (descending), creates (ascending) |
//! | reconcile   | truncation deletes (descending), updates (descending), creates (ascending) |

use crate::record::ChangeRecord;

/// A structural mutator invocation, as seen by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Append one element at the end.
    Push,
    /// Remove the last element.
    Pop,
    /// Remove the first element.
    Shift,
    /// Insert one element at the front.
    Unshift,
    /// Remove `removed` elements at `start`, then insert `inserted` elements
    /// there. Both are the values actually applied, after clamping.
    Splice {
        start: usize,
        removed: usize,
        inserted: usize,
    },
    /// Reverse the whole sequence.
    Reverse,
    /// Reorder the whole sequence.
    Sort,
}

impl Operation {
    /// Stable name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Shift => "shift",
            Self::Unshift => "unshift",
            Self::Splice { .. } => "splice",
            Self::Reverse => "reverse",
            Self::Sort => "sort",
        }
    }
}

/// Records for a structural operation, given the contents before (`old`) and
/// after (`new`) it ran.
///
/// Splice bounds are clamped against `old` so a caller passing the requested
/// (rather than applied) counts still gets a replayable batch.
#[must_use]
pub fn classify_structural<T: Clone>(op: Operation, old: &[T], new: &[T]) -> Vec<ChangeRecord<T>> {
    #[cfg(feature = "tracing")]
    tracing::trace!(op = op.name(), old_len = old.len(), new_len = new.len(), "classify structural");

    match op {
        Operation::Push => new
            .get(old.len())
            .map(|value| ChangeRecord::Created {
                index: old.len(),
                value: value.clone(),
            })
            .into_iter()
            .collect(),
        Operation::Pop => old
            .last()
            .map(|value| ChangeRecord::Deleted {
                index: old.len() - 1,
                value: value.clone(),
            })
            .into_iter()
            .collect(),
        Operation::Shift => old
            .first()
            .map(|value| ChangeRecord::Deleted {
                index: 0,
                value: value.clone(),
            })
            .into_iter()
            .collect(),
        Operation::Unshift => new
            .first()
            .map(|value| ChangeRecord::Created {
                index: 0,
                value: value.clone(),
            })
            .into_iter()
            .collect(),
        Operation::Splice {
            start,
            removed,
            inserted,
        } => {
            let start = start.min(old.len());
            let removed = removed.min(old.len() - start);
            let mut records = Vec::with_capacity(removed + inserted);
            records.extend((start..start + removed).rev().map(|index| ChangeRecord::Deleted {
                index,
                value: old[index].clone(),
            }));
            records.extend(
                new.iter()
                    .enumerate()
                    .skip(start)
                    .take(inserted)
                    .map(|(index, value)| ChangeRecord::Created {
                        index,
                        value: value.clone(),
                    }),
            );
            records
        }
        Operation::Reverse | Operation::Sort => rebuild(old, new),
    }
}

/// Full teardown and rebuild: every old element deleted (highest index
/// first), every new element created (lowest index first).
fn rebuild<T: Clone>(old: &[T], new: &[T]) -> Vec<ChangeRecord<T>> {
    let mut records = Vec::with_capacity(old.len() + new.len());
    records.extend(
        old.iter()
            .enumerate()
            .rev()
            .map(|(index, value)| ChangeRecord::Deleted {
                index,
                value: value.clone(),
            }),
    );
    records.extend(new.iter().enumerate().map(|(index, value)| ChangeRecord::Created {
        index,
        value: value.clone(),
    }));
    records
}

/// Records explaining how `old` became `new` through index and length
/// assignment. Returns an empty batch when the two are equal.
#[must_use]
pub fn classify_reconciled<T: Clone + PartialEq>(old: &[T], new: &[T]) -> Vec<ChangeRecord<T>> {
    let shared = old.len().min(new.len());
    let mut records = Vec::new();

    records.extend(
        old.iter()
            .enumerate()
            .skip(shared)
            .rev()
            .map(|(index, value)| ChangeRecord::Deleted {
                index,
                value: value.clone(),
            }),
    );

    records.extend(
        old[..shared]
            .iter()
            .zip(&new[..shared])
            .enumerate()
            .rev()
            .filter(|(_, (before, after))| before != after)
            .map(|(index, (before, after))| ChangeRecord::Updated {
                index,
                new_value: after.clone(),
                old_value: before.clone(),
            }),
    );

    records.extend(
        new.iter()
            .enumerate()
            .skip(shared)
            .map(|(index, value)| ChangeRecord::Created {
                index,
                value: value.clone(),
            }),
    );

    #[cfg(feature = "tracing")]
    tracing::trace!(
        old_len = old.len(),
        new_len = new.len(),
        records = records.len(),
        "classify reconciled"
    );

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply_records;
    use pretty_assertions::assert_eq;

    fn created<T>(index: usize, value: T) -> ChangeRecord<T> {
        ChangeRecord::Created { index, value }
    }

    fn deleted<T>(index: usize, value: T) -> ChangeRecord<T> {
        ChangeRecord::Deleted { index, value }
    }

    fn updated<T>(index: usize, new_value: T, old_value: T) -> ChangeRecord<T> {
        ChangeRecord::Updated {
            index,
            new_value,
            old_value,
        }
    }

    fn assert_replays<T: Clone + PartialEq + std::fmt::Debug>(
        old: &[T],
        new: &[T],
        records: &[ChangeRecord<T>],
    ) {
        let mut replay = old.to_vec();
        apply_records(&mut replay, records).expect("batch should replay");
        assert_eq!(replay, new.to_vec());
    }

    #[test]
    fn push_creates_at_old_len() {
        let old = [0, 1, 2, 3];
        let new = [0, 1, 2, 3, 9];
        let records = classify_structural(Operation::Push, &old, &new);
        assert_eq!(records, vec![created(4, 9)]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn pop_deletes_last() {
        let old = [0, 1, 2];
        let records = classify_structural(Operation::Pop, &old, &[0, 1]);
        assert_eq!(records, vec![deleted(2, 2)]);
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let records = classify_structural::<i32>(Operation::Pop, &[], &[]);
        assert!(records.is_empty());
    }

    #[test]
    fn shift_reports_only_removed_element() {
        let old = [-1, 0, 1];
        let new = [0, 1];
        let records = classify_structural(Operation::Shift, &old, &new);
        assert_eq!(records, vec![deleted(0, -1)]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn unshift_reports_only_inserted_element() {
        let old = ["hello", "world"];
        let new = ["zero", "hello", "world"];
        let records = classify_structural(Operation::Unshift, &old, &new);
        assert_eq!(records, vec![created(0, "zero")]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn splice_deletes_descending_then_creates_ascending() {
        let old = ["0", "hello", "world", "3"];
        let new = ["0", "1", "2", "3"];
        let op = Operation::Splice {
            start: 1,
            removed: 2,
            inserted: 2,
        };
        let records = classify_structural(op, &old, &new);
        assert_eq!(
            records,
            vec![
                deleted(2, "world"),
                deleted(1, "hello"),
                created(1, "1"),
                created(2, "2"),
            ]
        );
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn splice_clamps_to_old_len() {
        let old = [1, 2, 3];
        let new = [1];
        let op = Operation::Splice {
            start: 1,
            removed: 10,
            inserted: 0,
        };
        let records = classify_structural(op, &old, &new);
        assert_eq!(records, vec![deleted(2, 3), deleted(1, 2)]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn reverse_is_full_rebuild() {
        let old = [0, 1, 2, 3];
        let new = [3, 2, 1, 0];
        let records = classify_structural(Operation::Reverse, &old, &new);
        assert_eq!(
            records,
            vec![
                deleted(3, 3),
                deleted(2, 2),
                deleted(1, 1),
                deleted(0, 0),
                created(0, 3),
                created(1, 2),
                created(2, 1),
                created(3, 0),
            ]
        );
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn sort_never_reports_updates() {
        let old = [3, 1, 2];
        let new = [1, 2, 3];
        let records = classify_structural(Operation::Sort, &old, &new);
        assert!(records.iter().all(|r| !r.is_updated()));
        assert_eq!(records.len(), 6);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn reconcile_equal_contents_is_empty() {
        assert!(classify_reconciled(&[1, 2, 3], &[1, 2, 3]).is_empty());
    }

    #[test]
    fn reconcile_substitution_is_update() {
        let old = ["hello", "world"];
        let new = ["hello", "there"];
        let records = classify_reconciled(&old, &new);
        assert_eq!(records, vec![updated(1, "there", "world")]);
    }

    #[test]
    fn reconcile_updates_descend() {
        let old = ["world", "foo"];
        let new = ["hello", "bar"];
        let records = classify_reconciled(&old, &new);
        assert_eq!(
            records,
            vec![updated(1, "bar", "foo"), updated(0, "hello", "world")]
        );
    }

    #[test]
    fn reconcile_truncation_deletes_descending() {
        let old = [0, 1, 2, 3];
        let new = [0, 1];
        let records = classify_reconciled(&old, &new);
        assert_eq!(records, vec![deleted(3, 3), deleted(2, 2)]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn reconcile_growth_creates_ascending() {
        let old = [0, 1];
        let new = [0, 1, 2, 3];
        let records = classify_reconciled(&old, &new);
        assert_eq!(records, vec![created(2, 2), created(3, 3)]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn reconcile_mixed_truncation_and_update_replays() {
        let old = [5, 6, 7, 8];
        let new = [5, 60];
        let records = classify_reconciled(&old, &new);
        assert_eq!(records, vec![deleted(3, 8), deleted(2, 7), updated(1, 60, 6)]);
        assert_replays(&old, &new, &records);
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Push.name(), "push");
        assert_eq!(
            Operation::Splice {
                start: 0,
                removed: 0,
                inserted: 0
            }
            .name(),
            "splice"
        );
    }
}
