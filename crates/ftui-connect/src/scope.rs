#![forbid(unsafe_code)]

//! Tree-scoped context threaded explicitly from the composition root.
//!
//! A [`Scope`] is an immutable, cheaply cloneable chain of typed values. A
//! parent hands its scope to its children; a provider derives a child scope
//! with [`Scope::provide`] and hands that one down instead. Lookups walk the
//! chain from the innermost entry outwards, so an inner provider shadows an
//! outer one for its subtree only.
//!
//! # Invariants
//!
//! 1. `provide` never mutates the receiver; siblings holding the parent scope
//!    do not see the new value.
//! 2. `get::<T>()` returns the innermost value of type `T`.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

struct ScopeEntry {
    key: TypeId,
    type_name: &'static str,
    value: Rc<dyn Any>,
    parent: Option<Rc<ScopeEntry>>,
}

/// Immutable chain of typed context values.
#[derive(Clone, Default)]
pub struct Scope {
    head: Option<Rc<ScopeEntry>>,
}

impl Scope {
    /// An empty scope.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Derive a child scope carrying `value`.
    #[must_use]
    pub fn provide<T: Clone + 'static>(&self, value: T) -> Self {
        Self {
            head: Some(Rc::new(ScopeEntry {
                key: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                value: Rc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Innermost value of type `T`, if any.
    #[must_use]
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        let key = TypeId::of::<T>();
        self.entries()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.value.downcast_ref::<T>())
            .cloned()
    }

    /// Whether a value of type `T` is reachable.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        let key = TypeId::of::<T>();
        self.entries().any(|entry| entry.key == key)
    }

    /// Number of entries in the chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries().count()
    }

    fn entries(&self) -> impl Iterator<Item = &ScopeEntry> {
        std::iter::successors(self.head.as_deref(), |entry| entry.parent.as_deref())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries().map(|entry| entry.type_name))
            .finish()
    }
}
