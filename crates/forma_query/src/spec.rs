//! Queries and selections described relative to the feature that builds
//! them.
//!
//! A build output must stay valid when it is served from the cache to a
//! freshly parsed graph in which the same inputs carry different node ids.
//! Outputs therefore name features with [`NodeRef`]s and are turned into
//! concrete [`DeferredQuery`]s and [`FeatureSet`]s only when attached to a
//! node.

use std::collections::{BTreeSet, HashMap};

use forma_graph::{EntityId, EntityKind, FeatureGraph, FeatureSet, NodeId, NodeRef, SubArtifact};

use crate::error::QueryError;
use crate::predicate::Predicate;
use crate::query::{Cardinality, DeferredQuery, QueryArg};

/// A selection of entities of a feature, relative to the building node.
#[derive(Clone, Debug, PartialEq)]
pub struct SetSpec {
    /// The feature whose entities are selected.
    pub of: NodeRef,
    /// Kind of the selected entities.
    pub kind: EntityKind,
    /// Selected entity ids.
    pub ids: BTreeSet<EntityId>,
}

impl SetSpec {
    /// Creates a selection.
    pub fn new(of: NodeRef, kind: EntityKind, ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            of,
            kind,
            ids: ids.into_iter().collect(),
        }
    }

    /// Attaches the selection to `owner`'s inputs.
    pub fn attach(&self, owner: NodeId, graph: &FeatureGraph) -> Result<FeatureSet, QueryError> {
        let of = graph.resolve_ref(owner, self.of)?;
        Ok(FeatureSet::from_ids(of, self.kind, self.ids.iter().copied()))
    }
}

/// A relative supporting argument.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecArg {
    /// A whole feature.
    Node(NodeRef),
    /// A concrete selection.
    Set(SetSpec),
    /// A set or query published under a name by a feature. For
    /// [`NodeRef::Owner`] the name refers to an output of the same build.
    Named {
        /// The publishing feature.
        of: NodeRef,
        /// The sub-artifact name.
        name: String,
    },
}

/// A deferred query as produced by a build.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    owner: NodeRef,
    kind: EntityKind,
    predicate: Predicate,
    args: Vec<SpecArg>,
    base: Option<SpecArg>,
    cardinality: Cardinality,
}

impl QuerySpec {
    /// A query selecting `kind` entities of the building node itself.
    pub fn new(kind: EntityKind, predicate: Predicate) -> Self {
        Self {
            owner: NodeRef::Owner,
            kind,
            predicate,
            args: Vec::new(),
            base: None,
            cardinality: Cardinality::Any,
        }
    }

    /// Selects entities of another feature instead of the building node.
    pub fn on(mut self, owner: NodeRef) -> Self {
        self.owner = owner;
        self
    }

    /// Appends a supporting argument.
    pub fn arg(mut self, arg: SpecArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Restricts candidates to a selection.
    pub fn base(mut self, base: SpecArg) -> Self {
        self.base = Some(base);
        self
    }

    /// Requires exactly one match.
    pub fn exactly_one(mut self) -> Self {
        self.cardinality = Cardinality::ExactlyOne;
        self
    }

    /// The predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Makes the query concrete for `owner`.
    ///
    /// `local` holds the sub-artifacts already attached from the same build
    /// output and serves [`SpecArg::Named`] references to the owner.
    pub fn instantiate(
        &self,
        owner: NodeId,
        graph: &FeatureGraph,
        local: &HashMap<String, SubArtifact>,
    ) -> Result<DeferredQuery, QueryError> {
        let target = graph.resolve_ref(owner, self.owner)?;
        let mut query = DeferredQuery::new(target, self.kind, self.predicate.clone())
            .cardinality(self.cardinality);
        for arg in &self.args {
            query = query.arg(attach_arg(arg, owner, graph, local)?);
        }
        if let Some(base) = &self.base {
            query = query.base(attach_arg(base, owner, graph, local)?);
        }
        Ok(query)
    }
}

fn attach_arg(
    arg: &SpecArg,
    owner: NodeId,
    graph: &FeatureGraph,
    local: &HashMap<String, SubArtifact>,
) -> Result<QueryArg, QueryError> {
    match arg {
        SpecArg::Node(r) => Ok(QueryArg::Node(graph.resolve_ref(owner, *r)?)),
        SpecArg::Set(spec) => Ok(QueryArg::Set(spec.attach(owner, graph)?)),
        SpecArg::Named { of, name } => {
            let sub = match of {
                NodeRef::Owner => local.get(name).ok_or_else(|| {
                    forma_graph::GraphError::UnknownSubArtifact {
                        node: graph.display_name(owner),
                        name: name.clone(),
                    }
                })?,
                r => graph.sub_artifact(graph.resolve_ref(owner, *r)?, name)?,
            };
            match sub {
                SubArtifact::Set(s) => Ok(QueryArg::Set(s.clone())),
                SubArtifact::Query(q) => Ok(QueryArg::Query(*q)),
                other => Err(QueryError::NotASelection {
                    node: graph.display_name(graph.resolve_ref(owner, *of)?),
                    name: name.clone(),
                    found: other.kind_name(),
                }),
            }
        }
    }
}
