#![forbid(unsafe_code)]

//! State mappers with statically declared own-props dependency.
//!
//! A [`Selector`] is either state-only ([`Selector::State`]) or reads own
//! props too ([`Selector::StateAndProps`]). The variant is what decides
//! whether a change to a connected component's own props forces its derived
//! props to be recomputed.
//!
//! The user-facing mapper, [`MapState`], returns a [`Mapped`] value. On the
//! first computation for an instance the result is resolved once:
//!
//! - [`Mapped::Props`]: the mapper itself is used for every later
//!   computation.
//! - [`Mapped::Factory`]: the returned selector becomes the instance's
//!   mapper for every later computation. This lets an instance build
//!   per-instance memoization once.

use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::props::Props;

/// A pure function from state (and possibly own props) to `O`.
pub enum Selector<S, O = Value> {
    /// Reads state only.
    State(Rc<dyn Fn(&S) -> O>),
    /// Reads state and the instance's own props.
    StateAndProps(Rc<dyn Fn(&S, &Props) -> O>),
}

impl<S, O> Clone for Selector<S, O> {
    fn clone(&self) -> Self {
        match self {
            Self::State(f) => Self::State(Rc::clone(f)),
            Self::StateAndProps(f) => Self::StateAndProps(Rc::clone(f)),
        }
    }
}

impl<S, O> fmt::Debug for Selector<S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(_) => write!(f, "Selector::State(..)"),
            Self::StateAndProps(_) => write!(f, "Selector::StateAndProps(..)"),
        }
    }
}

impl<S, O> Selector<S, O> {
    /// A selector reading state only.
    pub fn from_state(f: impl Fn(&S) -> O + 'static) -> Self {
        Self::State(Rc::new(f))
    }

    /// A selector reading state and own props.
    pub fn from_state_and_props(f: impl Fn(&S, &Props) -> O + 'static) -> Self {
        Self::StateAndProps(Rc::new(f))
    }

    /// Whether the output can change when only own props change.
    #[inline]
    #[must_use]
    pub fn depends_on_own_props(&self) -> bool {
        matches!(self, Self::StateAndProps(_))
    }

    /// Run the selector. `own` is ignored by state-only selectors.
    pub fn select(&self, state: &S, own: &Props) -> O {
        match self {
            Self::State(f) => f(state),
            Self::StateAndProps(f) => f(state, own),
        }
    }
}

/// Result of the first invocation of a [`MapState`].
pub enum Mapped<S> {
    /// Derived props, expected to be a JSON object.
    Props(Value),
    /// Replace the mapper with this selector for the rest of the instance's
    /// life.
    Factory(Selector<S>),
}

impl<S> fmt::Debug for Mapped<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Props(value) => f.debug_tuple("Props").field(value).finish(),
            Self::Factory(selector) => f.debug_tuple("Factory").field(selector).finish(),
        }
    }
}

impl<S> From<Value> for Mapped<S> {
    fn from(value: Value) -> Self {
        Self::Props(value)
    }
}

impl<S> From<Props> for Mapped<S> {
    fn from(props: Props) -> Self {
        Self::Props(props.into_value())
    }
}

impl<S> From<Selector<S>> for Mapped<S> {
    fn from(selector: Selector<S>) -> Self {
        Self::Factory(selector)
    }
}

/// The mapper handed to `connect()`.
pub type MapState<S> = Selector<S, Mapped<S>>;

impl<S: 'static> Selector<S, Mapped<S>> {
    /// Plain mapper reading state only.
    pub fn props(f: impl Fn(&S) -> Value + 'static) -> Self {
        Self::State(Rc::new(move |state| Mapped::Props(f(state))))
    }

    /// Plain mapper reading state and own props.
    pub fn props_with_own(f: impl Fn(&S, &Props) -> Value + 'static) -> Self {
        Self::StateAndProps(Rc::new(move |state, own| Mapped::Props(f(state, own))))
    }

    /// Factory mapper: called once per instance to build that instance's
    /// selector.
    pub fn factory(make: impl Fn(&S, &Props) -> Selector<S> + 'static) -> Self {
        Self::StateAndProps(Rc::new(move |state, own| Mapped::Factory(make(state, own))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_selector_ignores_own_props() {
        let sel: Selector<i32> = Selector::from_state(|s| json!({ "n": s }));
        assert!(!sel.depends_on_own_props());
        let own = Props::new().with("n", 100);
        assert_eq!(sel.select(&3, &own), json!({ "n": 3 }));
    }

    #[test]
    fn props_selector_reads_own_props() {
        let sel: Selector<i32> = Selector::from_state_and_props(|s, own| {
            let step = own.get("step").and_then(Value::as_i64).unwrap_or(1);
            json!({ "n": i64::from(*s) * step })
        });
        assert!(sel.depends_on_own_props());
        assert_eq!(sel.select(&3, &Props::new().with("step", 2)), json!({ "n": 6 }));
    }

    #[test]
    fn map_state_constructors() {
        let plain = MapState::<i32>::props(|s| json!({ "n": s }));
        assert!(!plain.depends_on_own_props());
        assert!(matches!(plain.select(&1, &Props::new()), Mapped::Props(_)));

        let with_own = MapState::<i32>::props_with_own(|s, _| json!({ "n": s }));
        assert!(with_own.depends_on_own_props());

        let factory = MapState::<i32>::factory(|_, _| Selector::from_state(|s| json!({ "n": s })));
        match factory.select(&1, &Props::new()) {
            Mapped::Factory(inner) => assert!(!inner.depends_on_own_props()),
            Mapped::Props(_) => panic!("expected factory"),
        }
    }

    #[test]
    fn mapped_conversions() {
        let from_value: Mapped<()> = json!({ "a": 1 }).into();
        assert!(matches!(from_value, Mapped::Props(_)));
        let from_props: Mapped<()> = Props::new().with("a", 1).into();
        assert!(matches!(from_props, Mapped::Props(Value::Object(_))));
        let from_sel: Mapped<()> = Selector::<(), Value>::from_state(|_| json!({})).into();
        assert!(matches!(from_sel, Mapped::Factory(_)));
    }

    #[test]
    fn clone_shares_function() {
        let sel: Selector<i32> = Selector::from_state(|s| json!(s + 1));
        let copy = sel.clone();
        assert_eq!(copy.select(&1, &Props::new()), json!(2));
        assert_eq!(format!("{sel:?}"), "Selector::State(..)");
    }
}
