#![forbid(unsafe_code)]

//! Store-to-props connector for FrankenTUI component trees.
//!
//! Lets any component in a tree declare a pure mapping from shared
//! application state to the props it needs, without intermediate components
//! forwarding that state by hand.
//!
//! - [`Provider`] puts one data source into a [`Scope`] for its subtree.
//! - [`connect`] fixes a [`MapState`] mapper and [`ConnectOptions`];
//!   [`Connector::wrap`] turns a [`Component`] into a [`Connected`] wrapper.
//! - [`ConnectedInstance`] subscribes to the source, recomputes derived props
//!   only when needed, merges them with own props (own props win) and
//!   re-renders the wrapped component only when the merged props changed.
//!
//! # Architecture
//!
//! Everything is single-threaded: `Rc<RefCell<..>>` for shared state, change
//! handlers delivered synchronously in emission order. The data source is
//! only read ([`DataSource::get_state`]) and listened to
//! ([`DataSource::on`]/[`DataSource::off`]), never mutated.
//!
//! # Features
//!
//! - `store` (default): the reference in-memory [`Store`] data source.
//!   Without it the crate only consumes [`DataSource`] implementations
//!   supplied by the host.
//!
//! # Logging
//!
//! Uses `tracing` under the `ftui_connect::*` targets: `debug` for
//! subscription lifecycle and reloads, `trace` for per-change decisions,
//! `warn` for mapper results that are not plain objects (development mode
//! only, see [`BuildMode`]).

pub mod config;
pub mod connect;
pub mod error;
pub mod instance;
pub mod props;
pub mod provider;
pub mod scope;
pub mod selector;
pub mod source;
#[cfg(any(test, feature = "store"))]
pub mod store;

pub use config::{BuildMode, ConnectOptions};
pub use connect::{Component, Connected, Connector, connect};
pub use error::ConnectError;
pub use instance::{ConnectedInstance, Phase, UpdateOutcome};
pub use props::{Props, Statics};
pub use provider::Provider;
pub use scope::Scope;
pub use selector::{MapState, Mapped, Selector};
pub use source::{ChangeHandler, DataSource, ListenerId, SourceEvent, StoreHandle, Subscription};
#[cfg(any(test, feature = "store"))]
pub use store::Store;
