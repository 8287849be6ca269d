#![forbid(unsafe_code)]

//! The connector factory.
//!
//! [`connect`] runs once per call site and fixes the mapper, the options and
//! a process-wide version number. [`Connector::wrap`] turns a component type
//! into a [`Connected`] wrapper type, and [`Connected::construct`] creates
//! per-instance state ([`ConnectedInstance`]).
//!
//! # Example
//!
//! ```
//! use ftui_connect::{connect, Component, ConnectOptions, MapState, Props, Provider, Scope, Store};
//! use serde_json::json;
//!
//! #[derive(Debug, Clone)]
//! struct AppState { count: i64 }
//!
//! struct Counter;
//!
//! impl Component for Counter {
//!     type Output = String;
//!     fn render(&mut self, props: &Props) -> String {
//!         format!("count = {}", props.get("count").cloned().unwrap_or_default())
//!     }
//! }
//!
//! let store = Store::new(AppState { count: 0 });
//! let provider = Provider::new(store.clone(), vec![()]).unwrap();
//! let scope = provider.scope(&Scope::root());
//!
//! let connected = connect(
//!     Some(MapState::props(|s: &AppState| json!({ "count": s.count }))),
//!     ConnectOptions::default(),
//! )
//! .wrap(|| Counter);
//!
//! let mut counter = connected.construct(&scope, None, Props::new()).unwrap();
//! counter.mount();
//! assert_eq!(*counter.render().unwrap(), "count = 0");
//!
//! store.set(AppState { count: 1 });
//! assert!(counter.is_update_scheduled());
//! assert_eq!(*counter.render().unwrap(), "count = 1");
//! ```

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::config::ConnectOptions;
use crate::error::ConnectError;
use crate::instance::ConnectedInstance;
use crate::props::{Props, Statics, hoist_statics};
use crate::scope::Scope;
use crate::selector::MapState;
use crate::source::StoreHandle;

// ─── Version counter ────────────────────────────────────────────────────────

static NEXT_CONNECT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_CONNECT_VERSION.fetch_add(1, Ordering::Relaxed)
}

// ─── Component ──────────────────────────────────────────────────────────────

/// A component that renders props into some output.
///
/// One value of the implementing type is created per connected instance and
/// lives as long as that instance.
pub trait Component: 'static {
    /// What a render produces (a widget tree, a string, a frame plan...).
    type Output: 'static;

    /// Render with the merged props.
    fn render(&mut self, props: &Props) -> Self::Output;

    /// Name used in diagnostics. Defaults to the unqualified type name.
    fn display_name() -> String
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }

    /// Type-level metadata. Non-reserved entries are visible on the
    /// connected wrapper too.
    fn statics() -> Statics
    where
        Self: Sized,
    {
        Statics::new()
    }
}

// ─── Connector ──────────────────────────────────────────────────────────────

/// Per-call-site configuration shared by every instance built from it.
pub(crate) struct ConnectConfig<S> {
    pub(crate) mapper: MapState<S>,
    pub(crate) should_subscribe: bool,
    pub(crate) options: ConnectOptions,
    pub(crate) version: u64,
}

impl<S> fmt::Debug for ConnectConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("mapper", &self.mapper)
            .field("should_subscribe", &self.should_subscribe)
            .field("options", &self.options)
            .field("version", &self.version)
            .finish()
    }
}

/// Result of [`connect`]: a transform from component types to connected
/// wrapper types.
pub struct Connector<S> {
    config: Rc<ConnectConfig<S>>,
}

impl<S> Clone for Connector<S> {
    fn clone(&self) -> Self {
        Self {
            config: Rc::clone(&self.config),
        }
    }
}

impl<S> fmt::Debug for Connector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Connector").field(&self.config).finish()
    }
}

/// Build a connector from an optional state mapper.
///
/// Without a mapper the connector never subscribes and derives empty props.
/// Each call gets a fresh, strictly larger version number.
pub fn connect<S: 'static>(mapper: Option<MapState<S>>, options: ConnectOptions) -> Connector<S> {
    let should_subscribe = mapper.is_some();
    let mapper = mapper.unwrap_or_else(|| MapState::props(|_| Value::Object(Map::new())));
    let version = next_version();
    debug!(
        target: "ftui_connect::connect",
        version,
        should_subscribe,
        pure = options.pure,
        with_ref = options.with_ref,
        "connector created"
    );
    Connector {
        config: Rc::new(ConnectConfig {
            mapper,
            should_subscribe,
            options,
            version,
        }),
    }
}

impl<S: 'static> Connector<S> {
    /// Wrap a component type. `make` creates the wrapped component value for
    /// each new instance.
    pub fn wrap<C: Component>(&self, make: impl Fn() -> C + 'static) -> Connected<S, C> {
        Connected {
            slot: Rc::new(RefCell::new(Rc::clone(&self.config))),
            make: Rc::new(make),
            display_name: format!("Connect({})", C::display_name()),
        }
    }

    /// Version assigned to this call site.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.config.version
    }

    /// Options this connector was built with.
    #[must_use]
    pub fn options(&self) -> ConnectOptions {
        self.config.options
    }

    /// Whether instances subscribe to their data source.
    #[must_use]
    pub fn should_subscribe(&self) -> bool {
        self.config.should_subscribe
    }
}

// ─── Connected ──────────────────────────────────────────────────────────────

/// A connected wrapper type. Cloning yields another handle to the same type
/// (sharing its reload slot).
pub struct Connected<S, C> {
    slot: Rc<RefCell<Rc<ConnectConfig<S>>>>,
    make: Rc<dyn Fn() -> C>,
    display_name: String,
}

impl<S, C> Clone for Connected<S, C> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
            make: Rc::clone(&self.make),
            display_name: self.display_name.clone(),
        }
    }
}

impl<S, C> fmt::Debug for Connected<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("display_name", &self.display_name)
            .field("config", &*self.slot.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: 'static, C: Component> Connected<S, C> {
    /// `Connect(<wrapped name>)`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The wrapped component's statics, minus reserved names.
    #[must_use]
    pub fn statics() -> Statics {
        hoist_statics(&C::statics())
    }

    /// Version of the connector currently backing this type.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.slot.borrow().version
    }

    /// Options of the connector currently backing this type.
    #[must_use]
    pub fn options(&self) -> ConnectOptions {
        self.slot.borrow().options
    }

    /// Swap in a freshly defined connector (live reload).
    ///
    /// Mounted instances in development mode adopt it on their next
    /// pre-update hook; in optimized mode they keep their original
    /// configuration.
    pub fn reload(&self, connector: &Connector<S>) {
        debug!(
            target: "ftui_connect::connect",
            component = %self.display_name,
            from = self.slot.borrow().version,
            to = connector.config.version,
            "connector reloaded"
        );
        *self.slot.borrow_mut() = Rc::clone(&connector.config);
    }

    /// Create an instance.
    ///
    /// The data source is `store` when given, otherwise the innermost
    /// [`StoreHandle<S>`] in `scope`.
    ///
    /// # Errors
    ///
    /// [`ConnectError::MissingStore`] when neither supplies one.
    pub fn construct(
        &self,
        scope: &Scope,
        store: Option<StoreHandle<S>>,
        own_props: Props,
    ) -> Result<ConnectedInstance<S, C>, ConnectError> {
        let Some(store) = store.or_else(|| scope.get::<StoreHandle<S>>()) else {
            return Err(ConnectError::MissingStore {
                component: self.display_name.clone(),
            });
        };
        let config = Rc::clone(&*self.slot.borrow());
        Ok(ConnectedInstance::new(
            config,
            Rc::clone(&self.slot),
            store,
            (self.make)(),
            self.display_name.clone(),
            own_props,
        ))
    }
}
