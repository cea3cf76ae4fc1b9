#![forbid(unsafe_code)]

//! Runtime: watched sequences, observer dispatch, and timed reconciliation.
//!
//! # Role in seqwatch
//! `seqwatch-runtime` owns everything stateful. A [`WatchedSequence`] wraps a
//! `Vec` and intercepts its structural mutators; a [`Reconciler`] finds
//! changes made behind the interceptor's back (index and length
//! assignment); both hand their batches to the dispatcher, which calls the
//! registered [`Observer`]s.
//!
//! # Example
//!
//! ```
//! use seqwatch_runtime::Reconciler;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let reconciler = Reconciler::default();
//! let seq = reconciler.watch(vec![0, 1, 2, 3]);
//!
//! let created = Rc::new(RefCell::new(Vec::new()));
//! let log = Rc::clone(&created);
//! seq.on_create(move |value, index| log.borrow_mut().push((*value, index)));
//! created.borrow_mut().clear(); // drop the replay of existing elements
//!
//! seq.push(4);
//! assert_eq!(*created.borrow(), vec![(4, 4)]);
//!
//! seq.assign(5, 5).unwrap(); // not intercepted
//! reconciler.reconcile_now();
//! assert_eq!(*created.borrow(), vec![(4, 4), (5, 5)]);
//! ```
//!
//! # Architecture
//!
//! Single-threaded shared ownership (`Rc<RefCell<..>>`), as for any reactive
//! value: sequences, observers, and passes all live on one thread. The only
//! other thread is the optional [`ReconcileTimer`], which sends ticks and
//! never touches a sequence.
//!
//! # Invariants
//!
//! 1. Intercepted mutations dispatch before the mutating call returns, in
//!    call order.
//! 2. Substitutive mutations are coalesced and dispatched by the next pass.
//! 3. Observers are called in registration order; generic observers once per
//!    dispatch, category observers once per matching record, in record order.
//! 4. A panicking observer never prevents delivery to the others, and never
//!    leaves the snapshot stale.

pub mod config;
mod dispatch;
pub mod error;
pub mod observer;
pub mod reconcile;
pub mod sequence;
pub mod timer;

pub use config::{
    DEFAULT_RECONCILE_INTERVAL, INTERVAL_ENV_VAR, MIN_RECONCILE_INTERVAL, ReconcileConfig,
};
pub use error::WatchError;
pub use observer::{Observer, ObserverId};
pub use reconcile::{ReconcileReport, Reconciler};
pub use sequence::{SequenceId, SequenceStats, WatchedSequence, WeakSequence};
pub use timer::{ReconcileTimer, Tick};

pub use seqwatch_core::{
    ApplyError, Category, ChangeRecord, Operation, Snapshot, apply_records,
};
