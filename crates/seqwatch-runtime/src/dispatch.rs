#![forbid(unsafe_code)]

//! Delivery of one batch to the observers of one sequence.
//!
//! # Order
//!
//! 1. Every generic observer, in registration order, with `(new, old)`.
//! 2. For each record in batch order, every observer of the record's
//!    category, in registration order.
//!
//! # Failure Modes
//!
//! - **Panicking observer**: the panic is caught at the observer boundary,
//!   logged at `warn`, and counted. The remaining observers of the batch still
//!   run. Nothing is retried. Containment requires the default `unwind` panic
//!   strategy; under `panic = "abort"` the process aborts as usual.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use seqwatch_core::{Category, ChangeRecord, Snapshot};
use tracing::{debug_span, warn};

use crate::observer::Observer;
use crate::sequence::SequenceId;

/// One dispatch's worth of change: the snapshot pair and the records that
/// turn `old` into `new`.
pub(crate) struct Batch<T> {
    pub(crate) new: Snapshot<T>,
    pub(crate) old: Snapshot<T>,
    pub(crate) records: Vec<ChangeRecord<T>>,
}

/// Counts from one delivery round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DispatchOutcome {
    pub(crate) invocations: usize,
    pub(crate) failures: usize,
}

impl DispatchOutcome {
    fn record(&mut self, ok: bool) {
        self.invocations += 1;
        if !ok {
            self.failures += 1;
        }
    }
}

/// Deliver `batch` to `observers`.
pub(crate) fn dispatch<T>(
    sequence: SequenceId,
    source: &'static str,
    observers: &[Observer<T>],
    batch: &Batch<T>,
) -> DispatchOutcome {
    let _span = debug_span!(
        "dispatch",
        %sequence,
        source,
        records = batch.records.len(),
        observers = observers.len()
    )
    .entered();

    let mut outcome = DispatchOutcome::default();

    for observer in observers {
        if let Observer::Generic(f) = observer {
            outcome.record(invoke(sequence, Category::Generic, || {
                f(batch.new.as_slice(), batch.old.as_slice())
            }));
        }
    }

    for record in &batch.records {
        for observer in observers {
            let ok = match (observer, record) {
                (Observer::Create(f), ChangeRecord::Created { index, value }) => {
                    invoke(sequence, Category::Create, || f(value, *index))
                }
                (Observer::Delete(f), ChangeRecord::Deleted { index, value }) => {
                    invoke(sequence, Category::Delete, || f(value, *index))
                }
                (
                    Observer::Update(f),
                    ChangeRecord::Updated {
                        index,
                        new_value,
                        old_value,
                    },
                ) => invoke(sequence, Category::Update, || f(new_value, old_value, *index)),
                _ => continue,
            };
            outcome.record(ok);
        }
    }

    outcome
}

/// Replay the current contents to a freshly registered observer.
///
/// Generic observers see the contents as if created from nothing; create
/// observers get one call per element in ascending index order. Update and
/// delete observers have nothing to replay.
pub(crate) fn replay<T>(
    sequence: SequenceId,
    observer: &Observer<T>,
    current: &Snapshot<T>,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    match observer {
        Observer::Generic(f) => {
            let empty: &[T] = &[];
            outcome.record(invoke(sequence, Category::Generic, || {
                f(current.as_slice(), empty)
            }));
        }
        Observer::Create(f) => {
            for (index, value) in current.iter().enumerate() {
                outcome.record(invoke(sequence, Category::Create, || f(value, index)));
            }
        }
        Observer::Update(_) | Observer::Delete(_) => {}
    }
    outcome
}

/// Run one observer call inside a panic boundary. Returns `false` if it
/// panicked.
fn invoke(sequence: SequenceId, category: Category, call: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(()) => true,
        Err(payload) => {
            warn!(
                %sequence,
                category = category.as_str(),
                panic = %panic_message(payload.as_ref()),
                "observer panicked; continuing dispatch"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
