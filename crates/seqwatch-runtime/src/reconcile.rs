#![forbid(unsafe_code)]

//! Periodic reconciliation of watched sequences.
//!
//! # Design
//!
//! A [`Reconciler`] keeps a weak reference to every sequence it tracks, so it
//! never keeps a sequence alive; dropped sequences are pruned lazily during
//! the next pass. Sequences are only constructed through
//! [`watch`](Reconciler::watch), so every live sequence is reached by the
//! passes of the reconciler that created it. A pass diffs each live sequence against its snapshot and
//! dispatches one coalesced batch per sequence that changed.
//!
//! Passes run on the thread that owns the reconciler. When started, a
//! [`ReconcileTimer`] thread sends ticks over a channel; the owner calls
//! [`pump`](Reconciler::pump) from its event loop (or
//! [`wait_and_pump`](Reconciler::wait_and_pump) to block on the next tick).
//! Tests and host loops without a timer call
//! [`reconcile_now`](Reconciler::reconcile_now) directly.
//!
//! # Failure Modes
//!
//! - **Busy sequence**: a sequence borrowed elsewhere when the pass reaches
//!   it is skipped with a `warn` log and counted in
//!   [`ReconcileReport::failed`]. The pass continues with the next sequence,
//!   and the skipped one is retried on the following tick.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, debug_span, warn};

use crate::config::ReconcileConfig;
use crate::error::WatchError;
use crate::sequence::{SequenceId, WatchedSequence};
use crate::timer::ReconcileTimer;

/// A sequence that can be diffed against its snapshot, type-erased over its
/// element type.
pub(crate) trait Reconcile {
    fn sequence_id(&self) -> SequenceId;

    /// Dispatch pending changes. `Ok(true)` if anything was dispatched.
    fn reconcile(&self) -> Result<bool, WatchError>;
}

struct Tracked {
    id: SequenceId,
    target: Weak<dyn Reconcile>,
}

/// Totals for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Live sequences visited.
    pub examined: usize,
    /// Sequences that dispatched a batch.
    pub changed: usize,
    /// Sequences skipped because of an error.
    pub failed: usize,
}

pub struct Reconciler {
    config: ReconcileConfig,
    tracked: RefCell<Vec<Tracked>>,
    timer: Option<ReconcileTimer>,
    passes: Cell<u64>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("tracked", &self.tracked.borrow().len())
            .field("running", &self.timer.is_some())
            .field("passes", &self.passes.get())
            .finish()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}

impl Reconciler {
    /// A stopped reconciler with no tracked sequences.
    #[must_use]
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            tracked: RefCell::new(Vec::new()),
            timer: None,
            passes: Cell::new(0),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Construct a watched sequence and track it.
    pub fn watch<T: Clone + PartialEq + 'static>(&self, items: Vec<T>) -> WatchedSequence<T> {
        let sequence = WatchedSequence::new(items);
        self.track(&sequence);
        sequence
    }

    /// [`watch`](Self::watch) over the items of an iterator.
    pub fn watch_iter<T, I>(&self, items: I) -> WatchedSequence<T>
    where
        T: Clone + PartialEq + 'static,
        I: IntoIterator<Item = T>,
    {
        self.watch(items.into_iter().collect())
    }

    /// Also track a sequence created by another reconciler. Returns `false`
    /// if it was already tracked here.
    pub fn track<T: Clone + PartialEq + 'static>(&self, sequence: &WatchedSequence<T>) -> bool {
        let id = sequence.id();
        let mut tracked = self.tracked.borrow_mut();
        if tracked.iter().any(|entry| entry.id == id) {
            return false;
        }
        tracked.push(Tracked {
            id,
            target: sequence.reconcile_target(),
        });
        true
    }

    /// Number of tracked sequences that are still alive.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked
            .borrow()
            .iter()
            .filter(|entry| entry.target.strong_count() > 0)
            .count()
    }

    /// Completed passes so far.
    #[must_use]
    pub fn passes(&self) -> u64 {
        self.passes.get()
    }

    /// Run one pass over every tracked sequence.
    pub fn reconcile_now(&self) -> ReconcileReport {
        let _span = debug_span!("reconcile_pass", pass = self.passes.get() + 1).entered();

        // Upgrade outside the loop so observers may watch new sequences
        // while the pass is running.
        let targets: Vec<Rc<dyn Reconcile>> = {
            let mut tracked = self.tracked.borrow_mut();
            tracked.retain(|entry| entry.target.strong_count() > 0);
            tracked
                .iter()
                .filter_map(|entry| entry.target.upgrade())
                .collect()
        };

        let mut report = ReconcileReport::default();
        for target in &targets {
            report.examined += 1;
            match target.reconcile() {
                Ok(true) => report.changed += 1,
                Ok(false) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(sequence = %target.sequence_id(), error = %err, "reconcile failed");
                }
            }
        }

        self.passes.set(self.passes.get() + 1);
        debug!(
            examined = report.examined,
            changed = report.changed,
            failed = report.failed,
            "reconcile pass complete"
        );
        report
    }

    /// Start the timer thread. Starting twice is a no-op.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.timer.is_none() {
            self.timer = Some(ReconcileTimer::start(&self.config)?);
        }
        Ok(())
    }

    /// Stop the timer thread. Already-queued ticks are discarded.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.shutdown();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Run a pass if at least one tick is pending. Returns `None` when no
    /// tick was pending or the timer is not running.
    pub fn pump(&self) -> Option<ReconcileReport> {
        let timer = self.timer.as_ref()?;
        timer.try_tick().then(|| self.reconcile_now())
    }

    /// Block up to `timeout` for the next tick, then run a pass.
    pub fn wait_and_pump(&self, timeout: Duration) -> Option<ReconcileReport> {
        let timer = self.timer.as_ref()?;
        timer.wait_tick(timeout).then(|| self.reconcile_now())
    }
}
