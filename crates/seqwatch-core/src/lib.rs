#![forbid(unsafe_code)]

//! Core: change records, snapshots, and the change classifier.
//!
//! # Role in seqwatch
//! `seqwatch-core` is the pure layer. It knows nothing about observers,
//! timers, or shared ownership; it turns "what happened" (an [`Operation`]
//! plus before/after [`Snapshot`]s) into an ordered batch of
//! [`ChangeRecord`]s, and can replay such a batch onto a plain `Vec`.
//!
//! # Primary responsibilities
//! - **ChangeRecord / Category**: the typed change vocabulary delivered to
//!   observers.
//! - **Snapshot**: immutable, cheaply clonable copies used as diff baselines.
//! - **Classifier**: operation-specific record generation for intercepted
//!   mutations ([`classify_structural`]) and index-wise diffing for
//!   reconciliation ([`classify_reconciled`]).
//! - **Replay**: [`apply_records`] reconstructs the new contents from the old
//!   ones and a batch.
//!
//! # How it fits in the system
//! The runtime (`seqwatch-runtime`) owns the live collections, the snapshot
//! store, and the observer registry. It calls into this crate every time it
//! needs to decide which records a mutation produced.
//!
//! # Invariants
//!
//! 1. Structural operations never produce [`ChangeRecord::Updated`].
//! 2. Deletes within a batch are ordered by descending index; creates by
//!    ascending index.
//! 3. For every batch produced here, `apply_records(old, batch) == new`.

pub mod apply;
pub mod classify;
pub mod record;
pub mod snapshot;

pub use apply::{ApplyError, apply_records};
pub use classify::{Operation, classify_reconciled, classify_structural};
pub use record::{Category, ChangeRecord};
pub use snapshot::Snapshot;
