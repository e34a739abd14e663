//! Named predicate rules.

use std::collections::HashMap;

use crate::predicate::Predicate;

/// A table of named predicates that [`Predicate::Named`] expands to.
///
/// Rules may reference each other, including recursively; expansion depth
/// is bounded at resolution time.
#[derive(Clone, Debug, Default)]
pub struct RuleBook {
    rules: HashMap<String, Predicate>,
}

impl RuleBook {
    /// Creates an empty rule book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or replaces a rule. Returns the previous definition.
    pub fn define(&mut self, name: impl Into<String>, predicate: Predicate) -> Option<Predicate> {
        self.rules.insert(name.into(), predicate)
    }

    /// Builder form of [`define`](Self::define).
    pub fn with(mut self, name: impl Into<String>, predicate: Predicate) -> Self {
        self.define(name, predicate);
        self
    }

    /// Looks up a rule.
    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.rules.get(name)
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is defined.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
