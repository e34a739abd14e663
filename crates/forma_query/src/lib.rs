//! Deferred structural queries over built feature topology.
//!
//! A query names an owning feature, an entity kind and a [`Predicate`]. It
//! is registered when the owning feature's build produces it and resolved
//! only on first access, once the owner and every supporting feature have
//! finished building. Predicates are a closed language evaluated over plain
//! [`Topology`](forma_graph::Topology) tables, so they never touch a
//! geometry kernel.

#![warn(missing_docs)]

pub mod error;
pub mod eval;
pub mod predicate;
pub mod query;
pub mod rules;
pub mod spec;

pub use error::QueryError;
pub use eval::{BoundArg, Filter};
pub use predicate::{Extreme, Predicate};
pub use query::{Cardinality, DeferredQuery, QueryArg, QueryStore};
pub use rules::RuleBook;
pub use spec::{QuerySpec, SetSpec, SpecArg};
