//! Parameter binding scopes with lexical nesting.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A dynamically typed scenario parameter value.
///
/// Produced only by sampling; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Integer(i64),
    Double(f64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Integer(v) => write!(f, "{}", v),
            ParameterValue::Double(v) => write!(f, "{}", v),
            ParameterValue::Boolean(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// A parameter-binding environment with lexical nesting.
///
/// Child scopes see parent bindings; writes stay local unless explicitly
/// propagated by the caller. A name bound locally shadows the same name
/// in an ancestor. Lifetime is bounded to one sample/execution cycle.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, ParameterValue>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    /// Creates an empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child scope whose lookups fall back to `self`.
    pub fn child(self: &Arc<Self>) -> Scope {
        Scope {
            bindings: HashMap::new(),
            parent: Some(Arc::clone(self)),
        }
    }

    /// Binds a parameter locally. Names are unique per scope; rebinding
    /// replaces the local value.
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.bindings.insert(name.into(), value);
    }

    /// Looks up a parameter, falling back through the parent chain.
    pub fn lookup(&self, name: &str) -> Option<&ParameterValue> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.lookup(name)))
    }

    /// Names bound locally in this scope (parents excluded).
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// Number of local bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when no local bindings exist.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
