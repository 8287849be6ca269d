#![forbid(unsafe_code)]

//! The data-source capability consumed by connectors.
//!
//! A data source holds application state owned elsewhere. The connector only
//! reads snapshots through [`DataSource::get_state`] and registers change
//! handlers through [`DataSource::on`] / [`DataSource::off`]; it never
//! mutates the source.
//!
//! [`StoreHandle`] erases the concrete source type so every consumer sees the
//! same `get_state()` / `subscribe()` surface regardless of the source's
//! native shape.

use std::fmt;
use std::rc::Rc;

/// Handler invoked when a data source emits an event.
pub type ChangeHandler = Rc<dyn Fn()>;

/// Events a data source can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceEvent {
    /// The state snapshot may have changed.
    Change,
}

/// Identifies a registered handler for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Capability set of an externally owned state container.
///
/// Implementations must not hold interior borrows while invoking handlers:
/// a handler is allowed to call `get_state()` and `off()` on the same source.
pub trait DataSource<S> {
    /// Current state snapshot.
    fn get_state(&self) -> Rc<S>;

    /// Register `handler` for `event`.
    fn on(&self, event: SourceEvent, handler: ChangeHandler) -> ListenerId;

    /// Remove a handler. Returns `false` if it was not registered.
    fn off(&self, event: SourceEvent, id: ListenerId) -> bool;
}

/// Shared, type-erased handle to a data source.
///
/// Cloning creates another handle to the **same** source.
pub struct StoreHandle<S> {
    source: Rc<dyn DataSource<S>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<S> fmt::Debug for StoreHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("source", &Rc::as_ptr(&self.source).cast::<()>())
            .finish()
    }
}

impl<S: 'static> StoreHandle<S> {
    /// Wrap a concrete data source.
    pub fn new(source: impl DataSource<S> + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    /// Wrap an already shared data source.
    pub fn from_rc(source: Rc<dyn DataSource<S>>) -> Self {
        Self { source }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn get_state(&self) -> Rc<S> {
        self.source.get_state()
    }

    /// Register a change handler. The returned guard removes it on drop.
    pub fn subscribe(&self, handler: impl Fn() + 'static) -> Subscription {
        let id = self.source.on(SourceEvent::Change, Rc::new(handler));
        let source = Rc::clone(&self.source);
        Subscription {
            id,
            unsubscribe: Some(Box::new(move || source.off(SourceEvent::Change, id))),
        }
    }

    /// Whether both handles point at the same source.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }
}

/// RAII guard for a registered change handler.
///
/// Dropping the guard, or calling [`Subscription::unsubscribe`], removes the
/// handler from the source exactly once.
pub struct Subscription {
    id: ListenerId,
    unsubscribe: Option<Box<dyn FnOnce() -> bool>>,
}

impl Subscription {
    /// The listener id assigned by the source.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the handler now. Returns whether the source still had it.
    pub fn unsubscribe(mut self) -> bool {
        self.unsubscribe.take().is_some_and(|off| off())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(off) = self.unsubscribe.take() {
            off();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
