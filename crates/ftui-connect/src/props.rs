#![forbid(unsafe_code)]

//! Plain key-value props with shallow equality and merging.
//!
//! # Invariants
//!
//! 1. `shallow_eq` holds iff both maps have the same key set and every
//!    value compares equal under `PartialEq`. `serde_json::Value` has no
//!    reference identity, so nested arrays and objects compare by value:
//!    memoization is value-based all the way down.
//! 2. `merged(derived, own)` contains every key of both inputs; on
//!    collision the value from `own` wins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Component props: a plain mapping from names to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Props(Map<String, Value>);

impl Props {
    /// Empty props.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Props from a JSON value. Returns `None` unless the value is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a prop, returning the previous value for that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a prop.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Remove a prop.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of props.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no props.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Shallow equality: same keys, equal values. Nested values compare by
    /// value, not identity.
    #[must_use]
    pub fn shallow_eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0
            .iter()
            .all(|(key, value)| other.0.get(key).is_some_and(|v| v == value))
    }

    /// Merge derived props with own props. Own props take precedence.
    #[must_use]
    pub fn merged(derived: &Self, own: &Self) -> Self {
        let mut out = derived.0.clone();
        for (key, value) in &own.0 {
            out.insert(key.clone(), value.clone());
        }
        Self(out)
    }

    /// The props as a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Props {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Type-level metadata a component exposes alongside its render function.
pub type Statics = BTreeMap<String, Value>;

/// Names owned by the connector machinery. These are never copied from a
/// wrapped component onto its wrapper.
pub const RESERVED_STATICS: &[&str] = &[
    "display_name",
    "default_props",
    "get_default_props",
    "prop_types",
    "context_types",
    "child_context_types",
    "mixins",
    "type",
    "name",
    "length",
    "prototype",
    "caller",
    "arguments",
    "arity",
];

/// Copy every non-reserved static from `source`.
#[must_use]
pub fn hoist_statics(source: &Statics) -> Statics {
    source
        .iter()
        .filter(|(name, _)| !RESERVED_STATICS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
