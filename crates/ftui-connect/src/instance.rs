#![forbid(unsafe_code)]

//! Per-instance state of a connected component.
//!
//! # Lifecycle
//!
//! ```text
//!            mount (subscribing)           change / new own props
//!   Idle ─────────────────────────▶ Subscribed ───────────────────▶ PendingRecompute
//!    ▲                                   │                                │
//!    │ unmount                           │ render                         │ render
//!    │                                   ▼                                ▼
//!    └───────────────────────────── Rendered ◀───────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. At most one subscription is active, and only between `mount()` and
//!    `unmount()`; `mount()` twice subscribes once and `unmount()` twice
//!    unsubscribes once.
//! 2. The subscription is dropped before the cache is cleared.
//! 3. Each render consumes exactly one generation of pending changes: all
//!    change flags are snapshotted and cleared before anything else happens.
//! 4. In pure mode a render that finds neither new derived props nor new own
//!    props returns the previously rendered `Rc` unchanged.
//!
//! # Change delivery
//!
//! Change notifications go through a per-instance mailbox. The handler posts
//! to the mailbox and processes pending notifications only if the instance
//! core is not already borrowed. A change emitted while a mapper or the
//! wrapped component is running is therefore handled after that work
//! completes, in emission order.
//!
//! # Failure Modes
//!
//! - **Mapper panics inside a change notification**: captured and returned
//!   as [`ConnectError::MapperPanicked`] from the next render.
//! - **Mapper panics during render**: propagates to the caller.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::connect::{Component, ConnectConfig};
use crate::error::{ConnectError, panic_message};
use crate::props::Props;
use crate::selector::{Mapped, MapState, Selector};
use crate::source::{StoreHandle, Subscription};

/// Where an instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Constructed or unmounted; not subscribed, nothing rendered yet.
    Idle,
    /// Mounted and listening for changes.
    Subscribed,
    /// A change was accepted; the next render must produce output.
    PendingRecompute,
    /// Output is cached and nothing is pending.
    Rendered,
}

/// Result of [`ConnectedInstance::update`].
#[derive(Debug)]
pub enum UpdateOutcome<O> {
    /// Nothing relevant changed; no render ran.
    Skipped,
    /// A render ran. The `Rc` is the cached output when nothing changed.
    Rendered(Rc<O>),
}

impl<O> UpdateOutcome<O> {
    /// The output, if a render ran.
    #[must_use]
    pub fn output(&self) -> Option<&Rc<O>> {
        match self {
            Self::Skipped => None,
            Self::Rendered(out) => Some(out),
        }
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    pending: Cell<usize>,
}

impl Mailbox {
    fn post(&self) {
        self.pending.set(self.pending.get() + 1);
    }

    fn drain<S: 'static, C: Component>(&self, core: &RefCell<InstanceCore<S, C>>) {
        while self.pending.get() > 0 {
            let Ok(mut core) = core.try_borrow_mut() else {
                return;
            };
            self.pending.set(self.pending.get() - 1);
            core.handle_change();
        }
    }
}

struct InstanceCore<S, C: Component> {
    config: Rc<ConnectConfig<S>>,
    store: StoreHandle<S>,
    component: String,
    own_props: Props,
    /// Last snapshot this instance accepted.
    state: Rc<S>,
    /// Established mapper; `None` until the first computation.
    selector: Option<Selector<S>>,
    derived: Option<Props>,
    merged: Option<Props>,
    rendered: Option<Rc<C::Output>>,
    own_props_changed: bool,
    state_changed: bool,
    precalculated: bool,
    precalc_error: Option<ConnectError>,
    update_scheduled: bool,
    /// Between `mount()` and `unmount()`.
    mounted: bool,
    subscription: Option<Subscription>,
    phase: Phase,
}

impl<S: 'static, C: Component> InstanceCore<S, C> {
    fn pure(&self) -> bool {
        self.config.options.pure
    }

    fn depends_on_own_props(&self) -> bool {
        match &self.selector {
            Some(selector) => selector.depends_on_own_props(),
            None => self.config.mapper.depends_on_own_props(),
        }
    }

    fn should_update(&self) -> bool {
        !self.pure() || self.own_props_changed || self.state_changed
    }

    fn clear_cache(&mut self) {
        self.selector = None;
        self.derived = None;
        self.merged = None;
        self.rendered = None;
        self.own_props_changed = true;
        self.state_changed = true;
        self.precalculated = false;
        self.precalc_error = None;
    }

    fn unsubscribe(&mut self) -> bool {
        let Some(subscription) = self.subscription.take() else {
            return false;
        };
        debug!(
            target: "ftui_connect::instance",
            component = %self.component,
            listener = subscription.id().0,
            "unsubscribed"
        );
        drop(subscription);
        true
    }

    fn check_shape(&self, value: Value) -> Props {
        let kind = match value {
            Value::Object(map) => return Props::from(map),
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        };
        if self.config.options.mode.is_development() {
            warn!(
                target: "ftui_connect::instance",
                component = %self.component,
                kind,
                "state mapper must return a plain object; treating result as empty props"
            );
        }
        Props::new()
    }

    fn compute_derived(&mut self) -> Props {
        let state = self.store.get_state();
        match &self.selector {
            Some(selector) => {
                let value = selector.select(&state, &self.own_props);
                self.check_shape(value)
            }
            None => self.configure_selector(&state),
        }
    }

    fn configure_selector(&mut self, state: &S) -> Props {
        let mapper = self.config.mapper.clone();
        match mapper.select(state, &self.own_props) {
            Mapped::Factory(inner) => {
                trace!(
                    target: "ftui_connect::instance",
                    component = %self.component,
                    depends_on_own_props = inner.depends_on_own_props(),
                    "factory mapper established per-instance selector"
                );
                self.selector = Some(inner);
                self.compute_derived()
            }
            Mapped::Props(value) => {
                self.selector = Some(plain_selector(mapper));
                self.check_shape(value)
            }
        }
    }

    /// Recompute derived props. Returns whether they changed.
    fn update_derived_if_needed(&mut self) -> bool {
        let next = self.compute_derived();
        if self.derived.as_ref().is_some_and(|prev| next.shallow_eq(prev)) {
            return false;
        }
        self.derived = Some(next);
        true
    }

    fn handle_change(&mut self) {
        if self.subscription.is_none() {
            return;
        }
        let state = self.store.get_state();
        if self.pure() && Rc::ptr_eq(&state, &self.state) {
            trace!(target: "ftui_connect::instance", component = %self.component, "same snapshot");
            return;
        }

        if self.pure() && !self.depends_on_own_props() {
            match catch_unwind(AssertUnwindSafe(|| self.update_derived_if_needed())) {
                Ok(false) => {
                    trace!(
                        target: "ftui_connect::instance",
                        component = %self.component,
                        "derived props unchanged"
                    );
                    self.state = state;
                    return;
                }
                Ok(true) => {}
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    debug!(
                        target: "ftui_connect::instance",
                        component = %self.component,
                        %message,
                        "mapper panicked during change; deferring to render"
                    );
                    self.precalc_error = Some(ConnectError::MapperPanicked {
                        component: self.component.clone(),
                        message,
                    });
                }
            }
            self.precalculated = true;
        }

        trace!(target: "ftui_connect::instance", component = %self.component, "update scheduled");
        self.state = state;
        self.state_changed = true;
        self.update_scheduled = true;
        self.phase = Phase::PendingRecompute;
    }

    fn receive_props(&mut self, next: Props) -> bool {
        if !self.pure() || !next.shallow_eq(&self.own_props) {
            self.own_props_changed = true;
            self.phase = Phase::PendingRecompute;
        }
        self.own_props = next;
        self.should_update()
    }

    fn render(&mut self, wrapped: &mut C) -> Result<Rc<C::Output>, ConnectError> {
        let own_props_changed = mem::take(&mut self.own_props_changed);
        let state_changed = mem::take(&mut self.state_changed);
        let precalculated = mem::take(&mut self.precalculated);
        let precalc_error = self.precalc_error.take();
        self.update_scheduled = false;

        if let Some(err) = precalc_error {
            return Err(err);
        }

        let mut should_update_derived = true;
        if self.pure() && self.rendered.is_some() {
            should_update_derived =
                state_changed || (own_props_changed && self.depends_on_own_props());
        }

        let derived_changed = if precalculated {
            true
        } else if should_update_derived {
            self.update_derived_if_needed()
        } else {
            false
        };

        trace!(
            target: "ftui_connect::instance",
            component = %self.component,
            own_props_changed,
            state_changed,
            precalculated,
            derived_changed,
            "render"
        );

        if !derived_changed && !own_props_changed {
            if let Some(rendered) = &self.rendered {
                self.phase = Phase::Rendered;
                return Ok(Rc::clone(rendered));
            }
        }

        let merged = match &self.derived {
            Some(derived) => Props::merged(derived, &self.own_props),
            None => self.own_props.clone(),
        };
        let output = Rc::new(wrapped.render(&merged));
        self.merged = Some(merged);
        self.rendered = Some(Rc::clone(&output));
        self.phase = Phase::Rendered;
        Ok(output)
    }
}

/// Adapt a plain mapper to the established-selector shape. A later call that
/// returns a factory is not a valid plain object.
fn plain_selector<S: 'static>(mapper: MapState<S>) -> Selector<S> {
    fn props_only<S>(mapped: Mapped<S>) -> Value {
        match mapped {
            Mapped::Props(value) => value,
            Mapped::Factory(_) => Value::Null,
        }
    }
    match mapper {
        Selector::State(f) => Selector::State(Rc::new(move |state| props_only(f(state)))),
        Selector::StateAndProps(f) => {
            Selector::StateAndProps(Rc::new(move |state, own| props_only(f(state, own))))
        }
    }
}

/// A live connected component.
///
/// Created by `Connected::construct`. Dropping it unsubscribes.
pub struct ConnectedInstance<S: 'static, C: Component> {
    core: Rc<RefCell<InstanceCore<S, C>>>,
    mailbox: Rc<Mailbox>,
    slot: Rc<RefCell<Rc<ConnectConfig<S>>>>,
    wrapped: C,
}

impl<S: 'static, C: Component> fmt::Debug for ConnectedInstance<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("ConnectedInstance");
        match self.core.try_borrow() {
            Ok(core) => dbg
                .field("component", &core.component)
                .field("phase", &core.phase)
                .field("version", &core.config.version)
                .field("subscribed", &core.subscription.is_some())
                .field("own_props", &core.own_props)
                .field("derived", &core.derived),
            Err(_) => dbg.field("core", &"<borrowed>"),
        };
        dbg.field("pending", &self.mailbox.pending.get()).finish()
    }
}

impl<S: 'static, C: Component> ConnectedInstance<S, C> {
    pub(crate) fn new(
        config: Rc<ConnectConfig<S>>,
        slot: Rc<RefCell<Rc<ConnectConfig<S>>>>,
        store: StoreHandle<S>,
        wrapped: C,
        component: String,
        own_props: Props,
    ) -> Self {
        let state = store.get_state();
        let core = InstanceCore {
            config,
            store,
            component,
            own_props,
            state,
            selector: None,
            derived: None,
            merged: None,
            rendered: None,
            own_props_changed: true,
            state_changed: true,
            precalculated: false,
            precalc_error: None,
            update_scheduled: false,
            mounted: false,
            subscription: None,
            phase: Phase::Idle,
        };
        Self {
            core: Rc::new(RefCell::new(core)),
            mailbox: Rc::new(Mailbox::default()),
            slot,
            wrapped,
        }
    }

    fn drain(&self) {
        self.mailbox.drain(&self.core);
    }

    fn try_subscribe(&self) {
        let mut core = self.core.borrow_mut();
        if !core.mounted || !core.config.should_subscribe || core.subscription.is_some() {
            return;
        }
        let weak = Rc::downgrade(&self.core);
        let mailbox = Rc::clone(&self.mailbox);
        let subscription = core.store.subscribe(move || {
            mailbox.post();
            if let Some(core) = weak.upgrade() {
                mailbox.drain(&core);
            }
        });
        debug!(
            target: "ftui_connect::instance",
            component = %core.component,
            version = core.config.version,
            listener = subscription.id().0,
            "subscribed"
        );
        core.subscription = Some(subscription);
        core.phase = Phase::Subscribed;
        // The snapshot was read at construction; catch anything emitted since.
        core.handle_change();
    }

    /// Attach to the data source. Subscribing instances register their
    /// change handler and reconcile once; calling again is a no-op.
    pub fn mount(&mut self) {
        self.core.borrow_mut().mounted = true;
        self.try_subscribe();
        self.drain();
    }

    /// Detach from the data source and drop every cached value.
    pub fn unmount(&mut self) {
        let mut core = self.core.borrow_mut();
        core.mounted = false;
        core.unsubscribe();
        core.clear_cache();
        core.update_scheduled = false;
        core.phase = Phase::Idle;
        drop(core);
        self.mailbox.pending.set(0);
    }

    /// Replace own props. Returns whether an update should follow.
    pub fn receive_props(&mut self, next: Props) -> bool {
        let should = self.core.borrow_mut().receive_props(next);
        self.drain();
        should
    }

    /// Whether anything pending warrants a re-render.
    #[must_use]
    pub fn should_update(&self) -> bool {
        self.core.borrow().should_update()
    }

    /// Whether a change notification asked for a re-render that has not
    /// happened yet.
    #[must_use]
    pub fn is_update_scheduled(&self) -> bool {
        self.core.borrow().update_scheduled
    }

    /// Pre-update hook. In development mode, adopts a newer connector
    /// installed by `Connected::reload` and clears the cache. A mounted
    /// instance also subscribes if the new connector needs it.
    pub fn will_update(&mut self) {
        let latest = Rc::clone(&*self.slot.borrow());
        {
            let mut core = self.core.borrow_mut();
            if !core.config.options.mode.is_development() || latest.version == core.config.version {
                return;
            }
            debug!(
                target: "ftui_connect::instance",
                component = %core.component,
                from = core.config.version,
                to = latest.version,
                "adopting reloaded connector"
            );
            core.config = latest;
        }
        self.try_subscribe();
        let mut core = self.core.borrow_mut();
        core.clear_cache();
        if core.mounted {
            core.phase = Phase::PendingRecompute;
        }
        drop(core);
        self.drain();
    }

    /// Render, reusing cached output when nothing relevant changed.
    ///
    /// # Errors
    ///
    /// [`ConnectError::MapperPanicked`] when the mapper panicked while
    /// handling a change since the last render.
    pub fn render(&mut self) -> Result<Rc<C::Output>, ConnectError> {
        let result = self.core.borrow_mut().render(&mut self.wrapped);
        self.drain();
        result
    }

    /// Host update cycle: skip when nothing changed, otherwise run the
    /// pre-update hook and render.
    pub fn update(&mut self) -> Result<UpdateOutcome<C::Output>, ConnectError> {
        if !self.should_update() {
            self.core.borrow_mut().update_scheduled = false;
            return Ok(UpdateOutcome::Skipped);
        }
        self.force_update()
    }

    /// Run the pre-update hook and render regardless of
    /// [`should_update`](Self::should_update).
    pub fn force_update(&mut self) -> Result<UpdateOutcome<C::Output>, ConnectError> {
        self.will_update();
        self.render().map(UpdateOutcome::Rendered)
    }

    /// The wrapped component value.
    ///
    /// # Errors
    ///
    /// [`ConnectError::RefNotEnabled`] unless the connector was built with
    /// `with_ref`.
    pub fn wrapped_instance(&self) -> Result<&C, ConnectError> {
        self.check_ref()?;
        Ok(&self.wrapped)
    }

    /// Mutable access to the wrapped component value.
    ///
    /// # Errors
    ///
    /// [`ConnectError::RefNotEnabled`] unless the connector was built with
    /// `with_ref`.
    pub fn wrapped_instance_mut(&mut self) -> Result<&mut C, ConnectError> {
        self.check_ref()?;
        Ok(&mut self.wrapped)
    }

    fn check_ref(&self) -> Result<(), ConnectError> {
        let core = self.core.borrow();
        if core.config.options.with_ref {
            Ok(())
        } else {
            Err(ConnectError::RefNotEnabled {
                component: core.component.clone(),
            })
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.core.borrow().phase
    }

    /// Whether a change handler is registered.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.core.borrow().subscription.is_some()
    }

    /// Display name of the wrapper.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.core.borrow().component.clone()
    }

    /// Connector version this instance is running.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.core.borrow().config.version
    }

    /// The data source this instance reads from.
    #[must_use]
    pub fn store(&self) -> StoreHandle<S> {
        self.core.borrow().store.clone()
    }

    /// Own props as last received.
    #[must_use]
    pub fn own_props(&self) -> Props {
        self.core.borrow().own_props.clone()
    }

    /// Cached derived props, if computed.
    #[must_use]
    pub fn derived_props(&self) -> Option<Props> {
        self.core.borrow().derived.clone()
    }

    /// Props passed to the wrapped component by the last render that
    /// produced new output.
    #[must_use]
    pub fn merged_props(&self) -> Option<Props> {
        self.core.borrow().merged.clone()
    }

    /// Last rendered output.
    #[must_use]
    pub fn rendered(&self) -> Option<Rc<C::Output>> {
        self.core.borrow().rendered.clone()
    }
}

impl<S: 'static, C: Component> Drop for ConnectedInstance<S, C> {
    fn drop(&mut self) {
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.unsubscribe();
        }
    }
}
