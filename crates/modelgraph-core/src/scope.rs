//! # Variable Scopes
//!
//! Nested name bindings for graph builders.
//!
//! A scope borrows its parent, so a child can never outlive the scope it
//! shadows. Registration is local; lookup walks outward.

use crate::types::GraphError;
use std::collections::BTreeMap;

/// One level of name bindings.
#[derive(Debug, Clone)]
pub struct VariableScope<'p, V> {
    parent: Option<&'p VariableScope<'p, V>>,
    bindings: BTreeMap<String, V>,
}

impl<V> Default for VariableScope<'_, V> {
    fn default() -> Self {
        Self {
            parent: None,
            bindings: BTreeMap::new(),
        }
    }
}

impl<'p, V> VariableScope<'p, V> {
    /// Create a root scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scope nested in this one.
    #[must_use]
    pub fn child(&self) -> VariableScope<'_, V> {
        VariableScope {
            parent: Some(self),
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `name` in this scope.
    ///
    /// Shadowing a binding of an enclosing scope is allowed; binding a name
    /// twice in the same scope fails and keeps the first value.
    pub fn register(&mut self, name: impl Into<String>, value: V) -> Result<(), GraphError> {
        let name = name.into();
        if self.bindings.contains_key(&name) {
            return Err(GraphError::VariableNameConflict { name });
        }
        self.bindings.insert(name, value);
        Ok(())
    }

    /// Look `name` up here, then in each enclosing scope.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&V> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.bindings.get(name) {
                return Some(value);
            }
            scope = current.parent;
        }
        None
    }

    /// Look `name` up in this scope only.
    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<&V> {
        self.bindings.get(name)
    }

    #[must_use]
    pub fn parent(&self) -> Option<&'p VariableScope<'p, V>> {
        self.parent
    }

    /// Number of enclosing scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.parent;
        while let Some(current) = scope {
            depth += 1;
            scope = current.parent;
        }
        depth
    }

    /// Names bound in this scope, in order.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}
