#![forbid(unsafe_code)]

//! Errors surfaced by the runtime.
//!
//! Observer failures are not represented here: a panicking observer is
//! contained by the dispatcher, logged, and counted in
//! [`SequenceStats::observer_failures`](crate::SequenceStats), but never
//! returned to the code that mutated the sequence.

use std::fmt;

use crate::sequence::SequenceId;

/// Errors from registration, substitutive mutation, and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    /// `observe` was called through a handle whose sequence no longer exists.
    InvalidObserverTarget,
    /// The sequence was borrowed elsewhere when a reconciliation pass reached
    /// it (for example from inside a [`with`](crate::WatchedSequence::with)
    /// closure).
    SequenceBusy { id: SequenceId },
    /// An index assignment past the end of the sequence.
    IndexOutOfBounds { index: usize, len: usize },
    /// The reconciliation timer thread could not be spawned.
    TimerSpawn(String),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidObserverTarget => {
                f.write_str("observer target is not a live watched sequence")
            }
            Self::SequenceBusy { id } => write!(f, "{id} is borrowed; reconciliation skipped"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for assignment (length {len})")
            }
            Self::TimerSpawn(msg) => write!(f, "failed to spawn reconciliation timer: {msg}"),
        }
    }
}

impl std::error::Error for WatchError {}
