#![forbid(unsafe_code)]

//! Observer callbacks and the per-sequence registry.
//!
//! Each [`Observer`] variant carries a callback typed for its category, so a
//! create observer can never be handed an update. Callbacks are stored as
//! `Rc<dyn Fn ..>`: the dispatcher clones the handles out of the registry and
//! calls them with no borrow held, which lets a callback register or remove
//! observers, or mutate the sequence it is observing.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use seqwatch_core::Category;

type GenericFn<T> = Rc<dyn Fn(&[T], &[T])>;
type CreateFn<T> = Rc<dyn Fn(&T, usize)>;
type UpdateFn<T> = Rc<dyn Fn(&T, &T, usize)>;
type DeleteFn<T> = Rc<dyn Fn(&T, usize)>;

/// A registered callback, tagged with the category it listens to.
///
/// | Variant   | Arguments                     | Called                     |
/// |-----------|-------------------------------|----------------------------|
/// | `Generic` | `(new, old)` contents         | once per dispatch          |
/// | `Create`  | `(value, index)`              | once per created record    |
/// | `Update`  | `(new_value, old_value, index)` | once per updated record  |
/// | `Delete`  | `(value, index)`              | once per deleted record    |
pub enum Observer<T> {
    Generic(GenericFn<T>),
    Create(CreateFn<T>),
    Update(UpdateFn<T>),
    Delete(DeleteFn<T>),
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Generic(f) => Self::Generic(Rc::clone(f)),
            Self::Create(f) => Self::Create(Rc::clone(f)),
            Self::Update(f) => Self::Update(Rc::clone(f)),
            Self::Delete(f) => Self::Delete(Rc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("category", &self.category())
            .finish_non_exhaustive()
    }
}

impl<T> Observer<T> {
    pub fn generic(f: impl Fn(&[T], &[T]) + 'static) -> Self {
        Self::Generic(Rc::new(f))
    }

    pub fn create(f: impl Fn(&T, usize) + 'static) -> Self {
        Self::Create(Rc::new(f))
    }

    pub fn update(f: impl Fn(&T, &T, usize) + 'static) -> Self {
        Self::Update(Rc::new(f))
    }

    pub fn delete(f: impl Fn(&T, usize) + 'static) -> Self {
        Self::Delete(Rc::new(f))
    }

    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Generic(_) => Category::Generic,
            Self::Create(_) => Category::Create,
            Self::Update(_) => Category::Update,
            Self::Delete(_) => Category::Delete,
        }
    }
}

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by `observe`, used to unregister.
///
/// Ids are unique across all sequences in the process, so an id from one
/// sequence never removes an observer of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Observers of one sequence, in registration order.
pub(crate) struct ObserverRegistry<T> {
    entries: Vec<(ObserverId, Observer<T>)>,
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ObserverRegistry<T> {
    pub(crate) fn register(&mut self, observer: Observer<T>) -> ObserverId {
        let id = ObserverId::next();
        self.entries.push((id, observer));
        id
    }

    /// Remove the observer with `id`. Returns whether it was present.
    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn count(&self, category: Category) -> usize {
        self.entries
            .iter()
            .filter(|(_, observer)| observer.category() == category)
            .count()
    }

    /// Clone every handle, for calling outside the registry borrow.
    pub(crate) fn handles(&self) -> Vec<Observer<T>> {
        self.entries
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_preserves_order() {
        let mut registry: ObserverRegistry<i32> = ObserverRegistry::default();
        registry.register(Observer::delete(|_, _| {}));
        registry.register(Observer::generic(|_, _| {}));
        registry.register(Observer::create(|_, _| {}));

        let categories: Vec<_> = registry.handles().iter().map(Observer::category).collect();
        assert_eq!(
            categories,
            vec![Category::Delete, Category::Generic, Category::Create]
        );
    }

    #[test]
    fn ids_are_unique_and_removable() {
        let mut registry: ObserverRegistry<i32> = ObserverRegistry::default();
        let a = registry.register(Observer::update(|_, _, _| {}));
        let b = registry.register(Observer::update(|_, _, _| {}));
        assert_ne!(a, b);
        assert_eq!(registry.count(Category::Update), 2);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.count(Category::Update), 1);
    }

    #[test]
    fn observer_debug_shows_category() {
        let observer: Observer<u8> = Observer::create(|_, _| {});
        let dbg = format!("{observer:?}");
        assert!(dbg.contains("Create"));
    }

    #[test]
    fn observer_id_display() {
        let mut registry: ObserverRegistry<()> = ObserverRegistry::default();
        let id = registry.register(Observer::generic(|_, _| {}));
        assert_eq!(id.to_string(), format!("observer#{}", id.get()));
    }
}
