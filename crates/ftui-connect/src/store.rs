#![forbid(unsafe_code)]

//! Reference data source: a shared, version-tracked state snapshot.
//!
//! # Design
//!
//! [`Store<S>`] keeps the current state as an `Rc<S>` snapshot inside shared
//! `Rc<RefCell<..>>` storage. Every [`set`](Store::set) replaces the snapshot
//! and emits [`SourceEvent::Change`] to all registered handlers in
//! registration order. No equality check happens here; deciding whether a
//! change matters is the consumer's job.
//!
//! # Failure Modes
//!
//! - **Handler removed mid-emission**: the handler list is snapshotted before
//!   any handler runs, so a handler removed by an earlier handler in the same
//!   cycle still receives that one event. Consumers guard against it.
//! - **Re-entrant set**: a handler may call `set()`; the nested emission
//!   completes before the outer one continues with its snapshot.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::source::{ChangeHandler, DataSource, ListenerId, SourceEvent};

struct StoreInner<S> {
    state: Rc<S>,
    version: u64,
    next_listener: u64,
    listeners: Vec<(ListenerId, ChangeHandler)>,
}

/// A minimal data source holding immutable state snapshots.
///
/// Cloning a `Store` creates a new handle to the **same** state and
/// listeners.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 per `set`/`update`.
/// 2. Handlers are invoked in registration order.
/// 3. `get_state()` between emissions returns the same `Rc` (pointer-equal).
pub struct Store<S> {
    inner: Rc<RefCell<StoreInner<S>>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("state", &inner.state)
            .field("version", &inner.version)
            .field("listener_count", &inner.listeners.len())
            .finish()
    }
}

impl<S: 'static> Store<S> {
    /// Create a store with the given initial state.
    #[must_use]
    pub fn new(state: S) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                state: Rc::new(state),
                version: 0,
                next_listener: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> Rc<S> {
        Rc::clone(&self.inner.borrow().state)
    }

    /// Replace the snapshot and emit a change.
    pub fn set(&self, state: S) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.state = Rc::new(state);
            inner.version += 1;
        }
        self.emit_change();
    }

    /// Derive the next snapshot from the current one and emit a change.
    pub fn update(&self, f: impl FnOnce(&S) -> S) {
        let current = self.state();
        self.set(f(&current));
    }

    /// Emit a change without replacing the snapshot.
    pub fn emit_change(&self) {
        let handlers: Vec<ChangeHandler> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in &handlers {
            handler();
        }
    }

    /// Number of `set`/`update` calls so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered change handlers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl<S: 'static> DataSource<S> for Store<S> {
    fn get_state(&self) -> Rc<S> {
        self.state()
    }

    fn on(&self, event: SourceEvent, handler: ChangeHandler) -> ListenerId {
        let SourceEvent::Change = event;
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, handler));
        id
    }

    fn off(&self, event: SourceEvent, id: ListenerId) -> bool {
        let SourceEvent::Change = event;
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener, _)| *listener != id);
        inner.listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_replaces_snapshot_and_bumps_version() {
        let store = Store::new(1);
        assert_eq!(*store.state(), 1);
        assert_eq!(store.version(), 0);

        store.set(2);
        assert_eq!(*store.state(), 2);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn snapshot_identity_stable_between_sets() {
        let store = Store::new(String::from("a"));
        let a = store.state();
        let b = store.state();
        assert!(Rc::ptr_eq(&a, &b));

        store.set(String::from("a"));
        assert!(!Rc::ptr_eq(&a, &store.state()));
    }

    #[test]
    fn every_set_emits_even_if_equal() {
        let store = Store::new(0);
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        store.on(
            SourceEvent::Change,
            Rc::new(move || hits_clone.set(hits_clone.get() + 1)),
        );

        store.set(0);
        store.set(0);
        store.emit_change();
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn update_derives_from_current() {
        let store = Store::new(vec![1, 2]);
        store.update(|v| {
            let mut next = v.clone();
            next.push(3);
            next
        });
        assert_eq!(*store.state(), vec![1, 2, 3]);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let store = Store::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ['A', 'B', 'C'] {
            let log = Rc::clone(&log);
            store.on(SourceEvent::Change, Rc::new(move || log.borrow_mut().push(tag)));
        }
        store.set(1);
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn off_removes_only_that_handler() {
        let store = Store::new(0);
        let a = Rc::new(Cell::new(0u32));
        let b = Rc::new(Cell::new(0u32));
        let (a2, b2) = (Rc::clone(&a), Rc::clone(&b));
        let id_a = store.on(SourceEvent::Change, Rc::new(move || a2.set(a2.get() + 1)));
        let _id_b = store.on(SourceEvent::Change, Rc::new(move || b2.set(b2.get() + 1)));

        assert!(store.off(SourceEvent::Change, id_a));
        assert!(!store.off(SourceEvent::Change, id_a));
        store.set(1);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn handler_may_read_state_and_unsubscribe() {
        let store = Store::new(0);
        let seen = Rc::new(Cell::new(-1));
        let id_slot = Rc::new(Cell::new(None));

        let store_clone = store.clone();
        let seen_clone = Rc::clone(&seen);
        let id_clone = Rc::clone(&id_slot);
        let id = store.on(
            SourceEvent::Change,
            Rc::new(move || {
                seen_clone.set(*store_clone.get_state());
                if let Some(id) = id_clone.get() {
                    store_clone.off(SourceEvent::Change, id);
                }
            }),
        );
        id_slot.set(Some(id));

        store.set(5);
        assert_eq!(seen.get(), 5);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn debug_format() {
        let store = Store::new(42);
        let dbg = format!("{store:?}");
        assert!(dbg.contains("Store"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("listener_count"));
    }
}
