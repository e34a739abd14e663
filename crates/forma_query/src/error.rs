//! Error types for query registration and resolution.

use forma_graph::{BuildState, EntityId, EntityKind, GraphError, NodeId, QueryId};

use crate::query::Cardinality;

/// Errors raised while instantiating or resolving a deferred query.
///
/// All of them surface lazily, at first access; none is raised while the
/// graph is being built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// The owner or a supporting feature has not finished building.
    #[error("query {query} cannot be resolved yet: feature `{node}` is {state}")]
    NotReady {
        /// The query being resolved.
        query: QueryId,
        /// Display name of the feature that is not built.
        node: String,
        /// Its current state.
        state: BuildState,
    },

    /// A query required exactly one match.
    #[error("query {query} matched {found} entities, expected {expected}")]
    Cardinality {
        /// The query being resolved.
        query: QueryId,
        /// What the query required.
        expected: Cardinality,
        /// How many entities matched.
        found: usize,
    },

    /// An extremal predicate named a metric some candidate lacks.
    #[error("{kind} {entity} has no metric `{metric}`")]
    UnknownMetric {
        /// The metric name.
        metric: String,
        /// Kind of the candidate.
        kind: EntityKind,
        /// The candidate lacking it.
        entity: EntityId,
    },

    /// A named predicate has no definition.
    #[error("no rule named `{0}`")]
    UnknownRule(String),

    /// Named rules nested deeper than the configured limit.
    #[error("rule `{rule}` nests deeper than {limit} levels")]
    RuleDepth {
        /// The rule whose expansion exceeded the limit.
        rule: String,
        /// The configured limit.
        limit: u32,
    },

    /// A predicate referenced an argument the query does not have.
    #[error("predicate refers to argument %{index} but the query has {len}")]
    ArgIndex {
        /// The referenced index.
        index: usize,
        /// Number of supporting arguments.
        len: usize,
    },

    /// An argument cannot be used the way the predicate uses it.
    #[error("argument %{index} {reason}")]
    ArgMismatch {
        /// The argument index.
        index: usize,
        /// What is wrong.
        reason: String,
    },

    /// The base selection belongs to another feature or entity kind.
    #[error("base selection is a {found_kind} set of {found_owner}, query selects {kind} of {owner}")]
    BaseMismatch {
        /// Owner of the query.
        owner: NodeId,
        /// Kind selected by the query.
        kind: EntityKind,
        /// Owner of the base selection.
        found_owner: NodeId,
        /// Kind of the base selection.
        found_kind: EntityKind,
    },

    /// A named sub-artifact used as a selection is neither a set nor a query.
    #[error("sub-artifact `{name}` of `{node}` is a {found}, not a selection")]
    NotASelection {
        /// Display name of the feature.
        node: String,
        /// Sub-artifact name.
        name: String,
        /// What it actually is.
        found: &'static str,
    },

    /// A query id that is not registered.
    #[error("unknown query {0}")]
    UnknownQuery(QueryId),

    /// A republished query would take an argument that depends on itself.
    #[error("query {0} would depend on itself")]
    SelfReference(QueryId),

    /// A graph lookup failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}
