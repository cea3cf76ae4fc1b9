#![forbid(unsafe_code)]

//! The watched sequence: a live `Vec` plus its snapshot and observers.
//!
//! # Design
//!
//! [`WatchedSequence<T>`] owns the live contents, the snapshot they were last
//! reported as, and the observer registry, all in shared reference-counted
//! storage. Cloning a handle shares all three.
//!
//! Mutation comes in two kinds:
//!
//! - **Structural** (`push`, `pop`, `shift`, `unshift`, `splice`, `reverse`,
//!   `sort`): the operation runs, the classifier turns it into records
//!   against the snapshot, the snapshot is replaced, and observers are called
//!   before the method returns.
//! - **Substitutive** (`assign`, `truncate`, `resize`, `with_raw`): only the
//!   live contents change. The difference is discovered by the next
//!   [`reconcile`](WatchedSequence::reconcile), usually driven by a
//!   [`Reconciler`](crate::Reconciler) tick, and delivered as one coalesced
//!   batch.
//!
//! Pending substitutive changes are flushed as their own batch before a
//! structural operation runs and before a new observer is registered, so
//! every batch replays exactly onto the snapshot it was computed from.
//!
//! # Invariants
//!
//! 1. After any structural call returns, `snapshot() == to_vec()`.
//! 2. `version()` increments by exactly 1 per dispatch.
//! 3. An operation that changes nothing dispatches nothing.
//!
//! # Failure Modes
//!
//! - **Mutation inside `with`**: calling a mutator from inside a
//!   [`with`](WatchedSequence::with) closure on the same sequence panics
//!   (RefCell borrow rules). A reconciliation pass that hits a borrowed
//!   sequence skips it with [`WatchError::SequenceBusy`] instead.
//! - **Mutation inside an observer**: allowed. No internal borrow is held
//!   while observers run; the nested mutation dispatches immediately, before
//!   the outer dispatch finishes.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use seqwatch_core::{
    Category, ChangeRecord, Operation, Snapshot, classify_reconciled, classify_structural,
};
use tracing::trace;

use crate::dispatch::{self, Batch};
use crate::error::WatchError;
use crate::observer::{Observer, ObserverId, ObserverRegistry};
use crate::reconcile::Reconcile;

static NEXT_SEQUENCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a watched sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceId(u64);

impl SequenceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq#{}", self.0)
    }
}

/// Dispatch counters for one sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceStats {
    /// Batches delivered.
    pub dispatches: u64,
    /// Records across all delivered batches.
    pub records: u64,
    /// Observer calls that panicked, replay included.
    pub observer_failures: u64,
}

struct SequenceState<T> {
    live: Vec<T>,
    snapshot: Snapshot<T>,
    version: u64,
    dispatches: u64,
    records: u64,
}

impl<T: Clone + PartialEq> SequenceState<T> {
    /// Replace the snapshot with the live contents and package the batch.
    /// An empty record list leaves everything untouched.
    fn commit(&mut self, records: Vec<ChangeRecord<T>>) -> Option<Batch<T>> {
        if records.is_empty() {
            return None;
        }
        let old = std::mem::replace(&mut self.snapshot, Snapshot::capture(&self.live));
        self.version += 1;
        self.dispatches += 1;
        self.records += records.len() as u64;
        Some(Batch {
            new: self.snapshot.clone(),
            old,
            records,
        })
    }

    fn take_reconciled(&mut self) -> Option<Batch<T>> {
        let records = classify_reconciled(&self.snapshot, &self.live);
        self.commit(records)
    }
}

pub(crate) struct SequenceInner<T> {
    id: SequenceId,
    state: RefCell<SequenceState<T>>,
    observers: RefCell<ObserverRegistry<T>>,
    observer_failures: Cell<u64>,
}

impl<T: Clone + PartialEq + 'static> SequenceInner<T> {
    fn deliver(&self, source: &'static str, batch: Batch<T>) {
        let observers = self.observers.borrow().handles();
        let outcome = dispatch::dispatch(self.id, source, &observers, &batch);
        trace!(
            sequence = %self.id,
            source,
            invocations = outcome.invocations,
            failures = outcome.failures,
            "dispatch complete"
        );
        self.note_failures(outcome.failures);
    }

    fn note_failures(&self, failures: usize) {
        if failures > 0 {
            self.observer_failures
                .set(self.observer_failures.get() + failures as u64);
        }
    }

    /// Deliver pending substitutive changes, if any.
    fn settle(&self) {
        let pending = self.state.borrow_mut().take_reconciled();
        if let Some(batch) = pending {
            self.deliver("flush", batch);
        }
    }

    /// Run a structural operation and dispatch what it produced.
    ///
    /// Pending substitutive changes are delivered first, with the snapshot
    /// and version at that batch's state, before `op` touches anything.
    fn intercept<R>(&self, op: impl FnOnce(&mut Vec<T>) -> (Operation, R)) -> R {
        self.settle();

        let (result, operation, flushed, batch) = {
            let mut guard = self.state.borrow_mut();
            let state = &mut *guard;
            // Non-empty only if a flush observer assigned behind the
            // interceptor; `op` must still classify against a settled
            // snapshot.
            let flushed = state.take_reconciled();
            let (operation, result) = op(&mut state.live);
            let records = classify_structural(operation, &state.snapshot, &state.live);
            (result, operation, flushed, state.commit(records))
        };

        if let Some(pending) = flushed {
            self.deliver("flush", pending);
        }
        match batch {
            Some(batch) => self.deliver(operation.name(), batch),
            None => trace!(sequence = %self.id, op = operation.name(), "no-op; nothing to dispatch"),
        }
        result
    }
}

impl<T: Clone + PartialEq + 'static> Reconcile for SequenceInner<T> {
    fn sequence_id(&self) -> SequenceId {
        self.id
    }

    fn reconcile(&self) -> Result<bool, WatchError> {
        let batch = self
            .state
            .try_borrow_mut()
            .map_err(|_| WatchError::SequenceBusy { id: self.id })?
            .take_reconciled();
        match batch {
            Some(batch) => {
                self.deliver("reconcile", batch);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// An observed, ordered, mutable sequence.
///
/// Cloning a `WatchedSequence` creates a new handle to the **same** contents,
/// snapshot and observers.
pub struct WatchedSequence<T> {
    inner: Rc<SequenceInner<T>>,
}

impl<T> Clone for WatchedSequence<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WatchedSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("WatchedSequence");
        dbg.field("id", &self.inner.id);
        match self.inner.state.try_borrow() {
            Ok(state) => dbg
                .field("contents", &state.live)
                .field("version", &state.version),
            Err(_) => dbg.field("contents", &"<borrowed>"),
        };
        dbg.field("observer_count", &self.inner.observers.borrow().len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> WatchedSequence<T> {
    /// Start watching `items`. The snapshot is seeded with them, so nothing
    /// is reported for the initial contents except the replay each observer
    /// gets when it registers.
    ///
    /// Public construction goes through [`Reconciler::watch`], so every
    /// sequence handed out is reached by reconciliation passes.
    ///
    /// [`Reconciler::watch`]: crate::Reconciler::watch
    #[must_use]
    pub(crate) fn new(items: Vec<T>) -> Self {
        let snapshot = Snapshot::capture(&items);
        Self {
            inner: Rc::new(SequenceInner {
                id: SequenceId::next(),
                state: RefCell::new(SequenceState {
                    live: items,
                    snapshot,
                    version: 0,
                    dispatches: 0,
                    records: 0,
                }),
                observers: RefCell::new(ObserverRegistry::default()),
                observer_failures: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> SequenceId {
        self.inner.id
    }

    /// Whether both handles refer to the same sequence.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakSequence<T> {
        WeakSequence {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn reconcile_target(&self) -> Weak<dyn Reconcile> {
        let weak: Weak<SequenceInner<T>> = Rc::downgrade(&self.inner);
        weak
    }

    // ── Reads ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.state.borrow().live.get(index).cloned()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.state.borrow().live.clone()
    }

    /// Access the live contents by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(self.inner.state.borrow().live.as_slice())
    }

    /// The contents as of the most recent dispatch.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        self.inner.state.borrow().snapshot.clone()
    }

    /// Whether substitutive changes are waiting for reconciliation.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        let state = self.inner.state.borrow();
        state.snapshot != state.live
    }

    /// Number of dispatches so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.state.borrow().version
    }

    #[must_use]
    pub fn stats(&self) -> SequenceStats {
        let state = self.inner.state.borrow();
        SequenceStats {
            dispatches: state.dispatches,
            records: state.records,
            observer_failures: self.inner.observer_failures.get(),
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    #[must_use]
    pub fn observer_count_for(&self, category: Category) -> usize {
        self.inner.observers.borrow().count(category)
    }

    // ── Observation ─────────────────────────────────────────────────────

    /// Register `observer` and immediately replay the current contents to it
    /// (generic: `(contents, [])`; create: one call per element). Pending
    /// substitutive changes are delivered to the existing observers first.
    ///
    /// Registering the same callback twice yields two independent observers.
    pub fn observe(&self, observer: Observer<T>) -> ObserverId {
        self.inner.settle();
        let id = self.inner.observers.borrow_mut().register(observer.clone());
        let current = self.snapshot();
        let outcome = dispatch::replay(self.inner.id, &observer, &current);
        self.inner.note_failures(outcome.failures);
        id
    }

    /// Observe whole-contents changes as `(new, old)`.
    pub fn on_change(&self, f: impl Fn(&[T], &[T]) + 'static) -> ObserverId {
        self.observe(Observer::generic(f))
    }

    /// Observe created elements as `(value, index)`.
    pub fn on_create(&self, f: impl Fn(&T, usize) + 'static) -> ObserverId {
        self.observe(Observer::create(f))
    }

    /// Observe in-place substitutions as `(new_value, old_value, index)`.
    pub fn on_update(&self, f: impl Fn(&T, &T, usize) + 'static) -> ObserverId {
        self.observe(Observer::update(f))
    }

    /// Observe deleted elements as `(value, index)`.
    pub fn on_delete(&self, f: impl Fn(&T, usize) + 'static) -> ObserverId {
        self.observe(Observer::delete(f))
    }

    /// Remove an observer. Returns whether it was registered here.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        self.inner.observers.borrow_mut().remove(id)
    }

    /// Diff the live contents against the snapshot and dispatch the
    /// difference as one batch. Returns whether anything was dispatched.
    pub fn reconcile(&self) -> Result<bool, WatchError> {
        self.inner.reconcile()
    }

    // ── Structural mutation (dispatches synchronously) ─────────────────

    /// Append `value` at the end.
    pub fn push(&self, value: T) {
        self.inner.intercept(|live| {
            live.push(value);
            (Operation::Push, ())
        });
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Option<T> {
        self.inner.intercept(|live| (Operation::Pop, live.pop()))
    }

    /// Remove and return the first element. Survivors are not reported as
    /// moved.
    pub fn shift(&self) -> Option<T> {
        self.inner.intercept(|live| {
            let removed = (!live.is_empty()).then(|| live.remove(0));
            (Operation::Shift, removed)
        })
    }

    /// Insert `value` at the front. Survivors are not reported as moved.
    pub fn unshift(&self, value: T) {
        self.inner.intercept(|live| {
            live.insert(0, value);
            (Operation::Unshift, ())
        });
    }

    /// Remove up to `delete_count` elements starting at `start` and insert
    /// `items` in their place. `start` past the end appends. Returns the
    /// removed elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = T>,
    ) -> Vec<T> {
        let items: Vec<T> = items.into_iter().collect();
        self.inner.intercept(|live| {
            let start = start.min(live.len());
            let removed = delete_count.min(live.len() - start);
            let inserted = items.len();
            let taken: Vec<T> = live.splice(start..start + removed, items).collect();
            (
                Operation::Splice {
                    start,
                    removed,
                    inserted,
                },
                taken,
            )
        })
    }

    /// Reverse in place, reported as a full rebuild.
    pub fn reverse(&self) {
        self.inner.intercept(|live| {
            live.reverse();
            (Operation::Reverse, ())
        });
    }

    /// Sort in place with `compare`, reported as a full rebuild.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> CmpOrdering) {
        self.inner.intercept(|live| {
            live.sort_by(compare);
            (Operation::Sort, ())
        });
    }

    // ── Substitutive mutation (discovered by reconciliation) ───────────

    /// Assign `value` at `index`, returning the previous element. `index ==
    /// len()` appends. Nothing is dispatched until the next reconciliation.
    pub fn assign(&self, index: usize, value: T) -> Result<Option<T>, WatchError> {
        let mut state = self.inner.state.borrow_mut();
        let len = state.live.len();
        match index.cmp(&len) {
            CmpOrdering::Less => Ok(Some(std::mem::replace(&mut state.live[index], value))),
            CmpOrdering::Equal => {
                state.live.push(value);
                Ok(None)
            }
            CmpOrdering::Greater => Err(WatchError::IndexOutOfBounds { index, len }),
        }
    }

    /// Shorten to `len` elements. No effect if already shorter.
    pub fn truncate(&self, len: usize) {
        self.inner.state.borrow_mut().live.truncate(len);
    }

    /// Resize to `len`, filling new slots with `fill`.
    pub fn resize(&self, len: usize, fill: T) {
        self.inner.state.borrow_mut().live.resize(len, fill);
    }

    /// Arbitrary unobserved access to the live contents. Whatever `f` does
    /// is reported by the next reconciliation as updates, creates and
    /// deletes by index.
    pub fn with_raw<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        f(&mut self.inner.state.borrow_mut().live)
    }
}

impl<T: Clone + PartialEq + Ord + 'static> WatchedSequence<T> {
    /// Sort ascending, reported as a full rebuild.
    pub fn sort(&self) {
        self.sort_by(T::cmp);
    }
}

/// Non-owning handle to a watched sequence.
///
/// Collaborators that should not keep a sequence alive hold one of these.
/// Registration through a handle whose sequence is gone fails with
/// [`WatchError::InvalidObserverTarget`] and has no side effect.
pub struct WeakSequence<T> {
    inner: Weak<SequenceInner<T>>,
}

impl<T> Clone for WeakSequence<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for WeakSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSequence")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> WeakSequence<T> {
    #[must_use]
    pub fn upgrade(&self) -> Option<WatchedSequence<T>> {
        self.inner.upgrade().map(|inner| WatchedSequence { inner })
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn observe(&self, observer: Observer<T>) -> Result<ObserverId, WatchError> {
        self.upgrade()
            .map(|sequence| sequence.observe(observer))
            .ok_or(WatchError::InvalidObserverTarget)
    }
}
