#![forbid(unsafe_code)]

//! Typed change records and observer categories.

use std::fmt;

/// The category an observer subscribes to.
///
/// `Generic` observers receive the whole `(new, old)` snapshot pair once per
/// dispatch; the other three receive one call per matching [`ChangeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    #[default]
    Generic,
    Create,
    Update,
    Delete,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 4] = [
        Category::Generic,
        Category::Create,
        Category::Update,
        Category::Delete,
    ];

    /// Lowercase name as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional change within a dispatch batch.
///
/// Indices always refer to the sequence as it is at the moment the record is
/// applied, i.e. after every earlier record in the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord<T> {
    /// `value` now lives at `index`.
    Created { index: usize, value: T },
    /// `value` was removed from `index`.
    Deleted { index: usize, value: T },
    /// The element at `index` was substituted in place.
    Updated {
        index: usize,
        new_value: T,
        old_value: T,
    },
}

impl<T> ChangeRecord<T> {
    /// Observer category this record is delivered to.
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Created { .. } => Category::Create,
            Self::Deleted { .. } => Category::Delete,
            Self::Updated { .. } => Category::Update,
        }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Created { index, .. }
            | Self::Deleted { index, .. }
            | Self::Updated { index, .. } => *index,
        }
    }

    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }

    #[must_use]
    pub const fn is_updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}
