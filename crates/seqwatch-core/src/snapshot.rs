#![forbid(unsafe_code)]

//! Immutable snapshots used as diff baselines.
//!
//! A [`Snapshot`] is captured once and never mutated afterwards. Cloning is
//! O(1) (reference-counted), so the runtime can hand the same snapshot pair to
//! every generic observer of a dispatch without copying the contents.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Ordered, immutable copy of a sequence's contents at one point in time.
pub struct Snapshot<T> {
    items: Arc<[T]>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> Snapshot<T> {
    /// A snapshot with no elements.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }

    /// Whether `self` and `other` share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Clone> Snapshot<T> {
    /// Copy `items` into a new snapshot.
    #[must_use]
    pub fn capture(items: &[T]) -> Self {
        Self {
            items: Arc::from(items),
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.to_vec()
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for Snapshot<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: Arc::from(items),
        }
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T: PartialEq> PartialEq for Snapshot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items[..] == other.items[..]
    }
}

impl<T: Eq> Eq for Snapshot<T> {}

impl<T: PartialEq> PartialEq<[T]> for Snapshot<T> {
    fn eq(&self, other: &[T]) -> bool {
        &self.items[..] == other
    }
}

impl<T: PartialEq> PartialEq<Vec<T>> for Snapshot<T> {
    fn eq(&self, other: &Vec<T>) -> bool {
        self.items[..] == other[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snap: Snapshot<i32> = Snapshot::empty();
        assert!(snap.is_empty());
        assert_eq!(snap, Vec::<i32>::new());
    }

    #[test]
    fn capture_copies_contents() {
        let mut source = vec![1, 2, 3];
        let snap = Snapshot::capture(&source);
        source.push(4);
        assert_eq!(snap, vec![1, 2, 3]);
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn clone_shares_allocation() {
        let snap = Snapshot::from(vec!["a", "b"]);
        let other = snap.clone();
        assert!(snap.ptr_eq(&other));
        assert!(!snap.ptr_eq(&Snapshot::capture(&["a", "b"])));
        assert_eq!(snap, Snapshot::capture(&["a", "b"]));
    }

    #[test]
    fn debug_formats_as_list() {
        let snap = Snapshot::from(vec![0, 1]);
        assert_eq!(format!("{snap:?}"), "[0, 1]");
    }
}
