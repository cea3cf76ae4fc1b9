#![forbid(unsafe_code)]

//! Reconciliation configuration.
//!
//! The interval trades detection latency for polling overhead. It is a
//! tunable, not a contract: substitutive mutations are reported no earlier
//! than the next tick and no later than one interval after the tick that
//! follows them (scheduling permitting).

use std::time::Duration;

/// Default time between reconciliation ticks.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_millis(100);

/// Intervals below this are raised to it.
pub const MIN_RECONCILE_INTERVAL: Duration = Duration::from_millis(1);

/// Environment variable overriding the interval, in milliseconds.
pub const INTERVAL_ENV_VAR: &str = "SEQWATCH_RECONCILE_INTERVAL_MS";

const DEFAULT_THREAD_NAME: &str = "seqwatch-reconcile";

/// Configuration for the [`Reconciler`](crate::Reconciler) and its timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// Name given to the timer thread.
    pub thread_name: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Default config with the interval taken from [`INTERVAL_ENV_VAR`] when
    /// it holds a positive integer.
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injected variable lookup.
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::default();
        match get_env(INTERVAL_ENV_VAR).and_then(|raw| raw.trim().parse::<u64>().ok()) {
            Some(ms) if ms > 0 => config.with_interval(Duration::from_millis(ms)),
            _ => config,
        }
    }

    /// Set the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_RECONCILE_INTERVAL);
        self
    }

    /// Set the timer thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// The interval actually used by the timer.
    #[must_use]
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_RECONCILE_INTERVAL)
    }
}
