#![forbid(unsafe_code)]

//! Background tick source for reconciliation.
//!
//! [`ReconcileTimer`] runs a named thread that emits a [`Tick`] every
//! interval over a bounded channel. The thread never touches a sequence: the
//! thread that owns the sequences drains the channel and runs the pass
//! itself, which keeps the single-threaded ownership model intact.
//!
//! # Coalescing Rules
//!
//! - The tick channel holds at most one pending tick. If the owner has not
//!   drained it by the next interval, that tick is dropped.
//! - Draining any number of pending ticks counts as one.
//!
//! # Shutdown
//!
//! Dropping the timer (or calling [`shutdown`](ReconcileTimer::shutdown))
//! closes the control channel, which wakes the thread immediately; the
//! thread is then joined.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::config::ReconcileConfig;
use crate::error::WatchError;

/// A "check now" message from the timer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

/// Capacity of the tick channel.
const TICK_CAPACITY: usize = 1;

pub struct ReconcileTimer {
    ticks: Receiver<Tick>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl std::fmt::Debug for ReconcileTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileTimer")
            .field("interval", &self.interval)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl ReconcileTimer {
    /// Spawn the timer thread.
    pub fn start(config: &ReconcileConfig) -> Result<Self, WatchError> {
        let interval = config.effective_interval();
        let (tick_tx, tick_rx) = mpsc::sync_channel::<Tick>(TICK_CAPACITY);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || timer_loop(interval, &tick_tx, &stop_rx))
            .map_err(|err| WatchError::TimerSpawn(err.to_string()))?;

        debug!(interval_ms = interval.as_millis() as u64, "reconcile timer started");

        Ok(Self {
            ticks: tick_rx,
            shutdown: Some(stop_tx),
            handle: Some(handle),
            interval,
        })
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drain pending ticks without blocking. Returns whether at least one was
    /// pending.
    pub fn try_tick(&self) -> bool {
        let mut ticked = false;
        while self.ticks.try_recv().is_ok() {
            ticked = true;
        }
        ticked
    }

    /// Block up to `timeout` for a tick, then drain any others.
    pub fn wait_tick(&self, timeout: Duration) -> bool {
        match self.ticks.recv_timeout(timeout) {
            Ok(Tick) => {
                self.try_tick();
                true
            }
            Err(_) => false,
        }
    }

    /// Stop and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender disconnects the control channel.
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("reconcile timer stopped");
        }
    }
}

impl Drop for ReconcileTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn timer_loop(interval: Duration, ticks: &SyncSender<Tick>, stop: &Receiver<()>) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match ticks.try_send(Tick) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => return,
            },
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
