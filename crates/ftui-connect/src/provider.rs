#![forbid(unsafe_code)]

//! Root-level provider that makes one data source reachable by a subtree.

use tracing::debug;

use crate::error::ConnectError;
use crate::scope::Scope;
use crate::source::{DataSource, StoreHandle};

/// Wraps exactly one child and exposes a data source to everything under it.
///
/// # Example
///
/// ```
/// use ftui_connect::{Provider, Scope, Store};
///
/// let store = Store::new(0u32);
/// let provider = Provider::new(store, vec!["app"]).unwrap();
///
/// let answer = provider.render(&Scope::root(), |scope, child| {
///     assert_eq!(*child, "app");
///     scope.get::<ftui_connect::StoreHandle<u32>>().map(|s| *s.get_state())
/// });
/// assert_eq!(answer, Some(0));
/// ```
#[derive(Debug)]
pub struct Provider<S, T> {
    store: StoreHandle<S>,
    child: T,
}

impl<S: 'static, T> Provider<S, T> {
    /// Create a provider over a concrete data source.
    ///
    /// Fails with [`ConnectError::InvalidChildren`] unless `children` has
    /// exactly one element.
    pub fn new(source: impl DataSource<S> + 'static, children: Vec<T>) -> Result<Self, ConnectError> {
        Self::from_handle(StoreHandle::new(source), children)
    }

    /// Create a provider over an existing handle.
    pub fn from_handle(store: StoreHandle<S>, children: Vec<T>) -> Result<Self, ConnectError> {
        let count = children.len();
        let mut children = children.into_iter();
        let (Some(child), None) = (children.next(), children.next()) else {
            return Err(ConnectError::InvalidChildren { count });
        };
        debug!(target: "ftui_connect::provider", store = ?store, "provider created");
        Ok(Self { store, child })
    }

    /// The provided data source.
    #[must_use]
    pub fn store(&self) -> &StoreHandle<S> {
        &self.store
    }

    /// The single wrapped child.
    #[must_use]
    pub fn child(&self) -> &T {
        &self.child
    }

    /// Consume the provider and return its child.
    pub fn into_child(self) -> T {
        self.child
    }

    /// Scope handed to the child: `parent` plus this provider's store.
    #[must_use]
    pub fn scope(&self, parent: &Scope) -> Scope {
        parent.provide(self.store.clone())
    }

    /// Render the child under this provider's scope.
    pub fn render<R>(&self, parent: &Scope, f: impl FnOnce(&Scope, &T) -> R) -> R {
        let scope = self.scope(parent);
        f(&scope, &self.child)
    }
}
