#![forbid(unsafe_code)]

//! Replaying a record batch onto plain contents.
//!
//! Observers that maintain a mirror of a watched sequence (a rendered list, a
//! secondary index) can feed each dispatch through [`apply_records`] instead
//! of re-reading the whole sequence. Replay is strict: a record that does not
//! fit the contents it is applied to is an error, and the contents are left
//! as they were before the offending record.

use std::fmt;

use crate::record::ChangeRecord;

/// A record could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The record's index is outside the contents at that point of the batch.
    IndexOutOfBounds {
        /// Position of the record within the batch.
        position: usize,
        index: usize,
        len: usize,
    },
    /// A delete or update named a value that is not the one at its index.
    ValueMismatch { position: usize, index: usize },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfBounds {
                position,
                index,
                len,
            } => write!(
                f,
                "record {position}: index {index} out of bounds for length {len}"
            ),
            Self::ValueMismatch { position, index } => {
                write!(f, "record {position}: value at index {index} does not match")
            }
        }
    }
}

impl std::error::Error for ApplyError {}

/// Apply `records` in order to `base`.
///
/// Records applied before a failing one stay applied.
pub fn apply_records<T: Clone + PartialEq>(
    base: &mut Vec<T>,
    records: &[ChangeRecord<T>],
) -> Result<(), ApplyError> {
    for (position, record) in records.iter().enumerate() {
        let len = base.len();
        match record {
            ChangeRecord::Created { index, value } => {
                if *index > len {
                    return Err(ApplyError::IndexOutOfBounds {
                        position,
                        index: *index,
                        len,
                    });
                }
                base.insert(*index, value.clone());
            }
            ChangeRecord::Deleted { index, value } => {
                match base.get(*index) {
                    None => {
                        return Err(ApplyError::IndexOutOfBounds {
                            position,
                            index: *index,
                            len,
                        });
                    }
                    Some(current) if current != value => {
                        return Err(ApplyError::ValueMismatch {
                            position,
                            index: *index,
                        });
                    }
                    Some(_) => {}
                }
                base.remove(*index);
            }
            ChangeRecord::Updated {
                index,
                new_value,
                old_value,
            } => match base.get_mut(*index) {
                None => {
                    return Err(ApplyError::IndexOutOfBounds {
                        position,
                        index: *index,
                        len,
                    });
                }
                Some(current) if current != old_value => {
                    return Err(ApplyError::ValueMismatch {
                        position,
                        index: *index,
                    });
                }
                Some(current) => *current = new_value.clone(),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_batch_is_noop() {
        let mut base = vec![1, 2];
        apply_records(&mut base, &[]).unwrap();
        assert_eq!(base, vec![1, 2]);
    }

    #[test]
    fn mixed_batch_applies_in_order() {
        let mut base = vec!['a', 'b', 'c'];
        let records = [
            ChangeRecord::Deleted { index: 2, value: 'c' },
            ChangeRecord::Updated {
                index: 0,
                new_value: 'z',
                old_value: 'a',
            },
            ChangeRecord::Created { index: 2, value: 'y' },
        ];
        apply_records(&mut base, &records).unwrap();
        assert_eq!(base, vec!['z', 'b', 'y']);
    }

    #[test]
    fn create_past_end_fails() {
        let mut base = vec![1];
        let err = apply_records(&mut base, &[ChangeRecord::Created { index: 3, value: 9 }])
            .unwrap_err();
        assert_eq!(
            err,
            ApplyError::IndexOutOfBounds {
                position: 0,
                index: 3,
                len: 1
            }
        );
    }

    #[test]
    fn delete_with_wrong_value_fails_and_keeps_earlier_records() {
        let mut base = vec![1, 2, 3];
        let records = [
            ChangeRecord::Deleted { index: 2, value: 3 },
            ChangeRecord::Deleted { index: 0, value: 7 },
        ];
        let err = apply_records(&mut base, &records).unwrap_err();
        assert_eq!(err, ApplyError::ValueMismatch { position: 1, index: 0 });
        assert_eq!(base, vec![1, 2]);
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn update_out_of_bounds_fails() {
        let mut base: Vec<i32> = Vec::new();
        let record = ChangeRecord::Updated {
            index: 0,
            new_value: 1,
            old_value: 0,
        };
        assert!(matches!(
            apply_records(&mut base, &[record]),
            Err(ApplyError::IndexOutOfBounds { .. })
        ));
    }
}
