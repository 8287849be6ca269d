#![forbid(unsafe_code)]

//! Errors raised by providers and connected components.

use std::any::Any;

/// Errors from connector and provider operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// Neither an explicit store nor a provided scope supplied a data source.
    MissingStore {
        /// Display name of the connected component.
        component: String,
    },
    /// `wrapped_instance()` was called on a connector built without `with_ref`.
    RefNotEnabled {
        /// Display name of the connected component.
        component: String,
    },
    /// A provider was given something other than exactly one child.
    InvalidChildren {
        /// Number of children supplied.
        count: usize,
    },
    /// The state mapper panicked while recomputing inside a change
    /// notification. Surfaced by the next render.
    MapperPanicked {
        /// Display name of the connected component.
        component: String,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingStore { component } => write!(
                f,
                "could not find a store in either the scope or the explicit store of \"{component}\"; \
                 wrap the root in a Provider or pass the store explicitly"
            ),
            Self::RefNotEnabled { component } => write!(
                f,
                "to access the wrapped instance of \"{component}\", enable with_ref in the connect options"
            ),
            Self::InvalidChildren { count } => {
                write!(f, "provider expects exactly one child, got {count}")
            }
            Self::MapperPanicked { component, message } => {
                write!(f, "state mapper of \"{component}\" panicked: {message}")
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
