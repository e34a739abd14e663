//! Deferred queries and the store that owns and resolves them.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use forma_common::Fingerprint;
use forma_config::QueryConfig;
use forma_graph::{
    Arena, BuildState, EntityKind, FeatureGraph, FeatureSet, NodeId, QueryId, Topology,
};
use tracing::debug;

use crate::error::QueryError;
use crate::eval::{BoundArg, Filter};
use crate::predicate::Predicate;
use crate::rules::RuleBook;

/// How many matches a query must produce.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Cardinality {
    /// Any number, including none.
    #[default]
    Any,
    /// Exactly one; anything else is a resolution error.
    ExactlyOne,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Any => write!(f, "any number"),
            Cardinality::ExactlyOne => write!(f, "exactly one"),
        }
    }
}

/// A supporting argument of a deferred query.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryArg {
    /// A whole feature.
    Node(NodeId),
    /// A concrete selection.
    Set(FeatureSet),
    /// The result of another query.
    Query(QueryId),
}

/// A memoized result and the fingerprints of the builds it was read from.
#[derive(Clone, Debug)]
struct Memo {
    basis: Vec<Fingerprint>,
    set: FeatureSet,
}

/// A structural lookup over one feature's built entities.
///
/// Nothing is evaluated when the query is created. A successful
/// [`QueryStore::resolve`] memoizes the result together with the
/// fingerprints of the owner and every supporting feature; later calls
/// return it without running the predicate again for as long as those
/// fingerprints are unchanged.
#[derive(Clone, Debug)]
pub struct DeferredQuery {
    owner: NodeId,
    kind: EntityKind,
    predicate: Predicate,
    args: Vec<QueryArg>,
    base: Option<QueryArg>,
    cardinality: Cardinality,
    memo: Option<Memo>,
    evaluations: u32,
}

impl DeferredQuery {
    /// Creates an unresolved query selecting `kind` entities of `owner`.
    pub fn new(owner: NodeId, kind: EntityKind, predicate: Predicate) -> Self {
        Self {
            owner,
            kind,
            predicate,
            args: Vec::new(),
            base: None,
            cardinality: Cardinality::Any,
            memo: None,
            evaluations: 0,
        }
    }

    /// Appends a supporting argument (`%0`, `%1`, ... in order).
    pub fn arg(mut self, arg: QueryArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Restricts candidates to a selection instead of every entity.
    pub fn base(mut self, base: QueryArg) -> Self {
        self.base = Some(base);
        self
    }

    /// Sets the required number of matches.
    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// The feature whose entities are selected.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// The entity kind selected.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Supporting arguments.
    pub fn args(&self) -> &[QueryArg] {
        &self.args
    }

    /// `true` once a resolution has succeeded.
    pub fn is_resolved(&self) -> bool {
        self.memo.is_some()
    }

    /// The memoized result of the last successful resolution.
    pub fn result(&self) -> Option<&FeatureSet> {
        self.memo.as_ref().map(|m| &m.set)
    }

    /// How many times the predicate has been evaluated.
    pub fn evaluations(&self) -> u32 {
        self.evaluations
    }

    fn nested(&self) -> impl Iterator<Item = QueryId> + '_ {
        self.args
            .iter()
            .chain(self.base.iter())
            .filter_map(|a| match a {
                QueryArg::Query(q) => Some(*q),
                _ => None,
            })
    }
}

/// Owns the deferred queries of one document.
///
/// Queries reference each other only by id and an argument must already be
/// registered, so nested resolution cannot loop. Queries published by a
/// feature's build keep their id across rebuilds of that feature: a new
/// build replaces them in place and withdraws the names it no longer
/// publishes.
#[derive(Debug)]
pub struct QueryStore {
    queries: Arena<QueryId, Option<DeferredQuery>>,
    published: HashMap<NodeId, HashMap<String, QueryId>>,
    live: usize,
    rules: RuleBook,
    tolerance: f64,
    max_rule_depth: u32,
}

impl Default for QueryStore {
    fn default() -> Self {
        Self::new(RuleBook::new(), &QueryConfig::default())
    }
}

impl QueryStore {
    /// Creates an empty store.
    pub fn new(rules: RuleBook, config: &QueryConfig) -> Self {
        Self {
            queries: Arena::new(),
            published: HashMap::new(),
            live: 0,
            rules,
            tolerance: config.tolerance,
            max_rule_depth: config.max_rule_depth,
        }
    }

    /// The rule book used for named predicates.
    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Mutable access to the rule book.
    ///
    /// Redefining a rule does not clear memoized results.
    pub fn rules_mut(&mut self) -> &mut RuleBook {
        &mut self.rules
    }

    /// Registers a query without evaluating it.
    pub fn register(&mut self, query: DeferredQuery) -> Result<QueryId, QueryError> {
        self.validate(&query)?;
        self.live += 1;
        Ok(self.queries.alloc(Some(query)))
    }

    /// Registers a query published by `owner`'s build under `name`.
    ///
    /// If the feature already published a query under that name, the new
    /// one takes its place and id, and the old memoized result is dropped.
    pub fn publish(
        &mut self,
        owner: NodeId,
        name: &str,
        query: DeferredQuery,
    ) -> Result<QueryId, QueryError> {
        let previous = self
            .published
            .get(&owner)
            .and_then(|names| names.get(name))
            .copied()
            .filter(|id| self.contains(*id));
        let Some(id) = previous else {
            let id = self.register(query)?;
            self.published
                .entry(owner)
                .or_default()
                .insert(name.to_string(), id);
            return Ok(id);
        };
        self.validate(&query)?;
        if query.nested().any(|q| q == id || self.reaches(q, id)) {
            return Err(QueryError::SelfReference(id));
        }
        self.queries[id] = Some(query);
        Ok(id)
    }

    /// Withdraws the queries `owner` published under names for which `keep`
    /// returns `false`. Returns how many were withdrawn.
    pub fn retain_published(&mut self, owner: NodeId, mut keep: impl FnMut(&str) -> bool) -> usize {
        let Some(names) = self.published.get_mut(&owner) else {
            return 0;
        };
        let mut stale = Vec::new();
        names.retain(|name, id| {
            let kept = keep(name);
            if !kept {
                stale.push(*id);
            }
            kept
        });
        if names.is_empty() {
            self.published.remove(&owner);
        }
        for &id in &stale {
            if self.queries.get_mut(id).and_then(Option::take).is_some() {
                self.live -= 1;
                debug!(query = %id, owner = %owner, "query withdrawn");
            }
        }
        stale.len()
    }

    /// Returns a query.
    pub fn get(&self, id: QueryId) -> Result<&DeferredQuery, QueryError> {
        self.queries
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(QueryError::UnknownQuery(id))
    }

    /// Returns `true` if the id names a live query.
    pub fn contains(&self, id: QueryId) -> bool {
        self.get(id).is_ok()
    }

    /// Returns `true` once the query has resolved successfully.
    pub fn is_resolved(&self, id: QueryId) -> bool {
        self.get(id).is_ok_and(DeferredQuery::is_resolved)
    }

    /// Resolves a query, or returns its memoized result.
    ///
    /// Fails with [`QueryError::NotReady`] if the owner or any feature
    /// backing an argument is not built, even when a result is memoized.
    /// A memo read from builds that have since been replaced is recomputed.
    /// Failed resolutions are not memoized.
    pub fn resolve(&mut self, id: QueryId, graph: &FeatureGraph) -> Result<&FeatureSet, QueryError> {
        let mut basis = Vec::new();
        self.basis(id, graph, &mut basis)?;
        let query = self.get(id)?;
        if !query.memo.as_ref().is_some_and(|m| m.basis == basis) {
            let nested: Vec<QueryId> = query.nested().collect();
            for q in nested {
                self.resolve(q, graph)?;
            }
            let result = self.evaluate(id, graph);
            let query = self.get_mut(id)?;
            query.evaluations += 1;
            query.memo = None;
            let set = result?;
            debug!(query = %id, owner = %query.owner, matched = set.len(), "query resolved");
            query.memo = Some(Memo { basis, set });
        }
        self.get(id)?.result().ok_or(QueryError::UnknownQuery(id))
    }

    /// Drops every query.
    pub fn clear(&mut self) {
        self.queries = Arena::new();
        self.published.clear();
        self.live = 0;
    }

    /// Returns the number of live queries.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no query is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn get_mut(&mut self, id: QueryId) -> Result<&mut DeferredQuery, QueryError> {
        self.queries
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(QueryError::UnknownQuery(id))
    }

    fn validate(&self, query: &DeferredQuery) -> Result<(), QueryError> {
        if let Some(missing) = query.nested().find(|q| !self.contains(*q)) {
            return Err(QueryError::UnknownQuery(missing));
        }
        if let Some(max) = query.predicate.max_arg() {
            if max >= query.args.len() {
                return Err(QueryError::ArgIndex {
                    index: max,
                    len: query.args.len(),
                });
            }
        }
        Ok(())
    }

    /// `true` if resolving `from` would resolve `target` along the way.
    fn reaches(&self, from: QueryId, target: QueryId) -> bool {
        let mut pending = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(q) = pending.pop() {
            if q == target {
                return true;
            }
            if seen.insert(q) {
                if let Ok(query) = self.get(q) {
                    pending.extend(query.nested());
                }
            }
        }
        false
    }

    /// Appends the fingerprints of the owner and every feature backing an
    /// argument, nested queries included, in argument order.
    fn basis(&self, id: QueryId, graph: &FeatureGraph, out: &mut Vec<Fingerprint>) -> Result<(), QueryError> {
        let query = self.get(id)?;
        let built = |node: NodeId| -> Result<Fingerprint, QueryError> {
            let n = graph.node(node)?;
            match (n.state(), n.fingerprint()) {
                (BuildState::Built, Some(fp)) => Ok(fp),
                (state, _) => Err(QueryError::NotReady {
                    query: id,
                    node: graph.display_name(node),
                    state,
                }),
            }
        };
        out.push(built(query.owner)?);
        for arg in query.args.iter().chain(query.base.iter()) {
            match arg {
                QueryArg::Node(n) => out.push(built(*n)?),
                QueryArg::Set(s) => out.push(built(s.owner())?),
                QueryArg::Query(q) => self.basis(*q, graph, out)?,
            }
        }
        Ok(())
    }

    fn selection<'s>(&'s self, arg: &'s QueryArg) -> Option<&'s FeatureSet> {
        match arg {
            QueryArg::Node(_) => None,
            QueryArg::Set(s) => Some(s),
            QueryArg::Query(q) => self.get(*q).ok().and_then(DeferredQuery::result),
        }
    }

    fn evaluate(&self, id: QueryId, graph: &FeatureGraph) -> Result<FeatureSet, QueryError> {
        let query = self.get(id)?;
        let topology = graph.artifact(query.owner)?.topology();

        let mut args = Vec::with_capacity(query.args.len());
        for arg in &query.args {
            args.push(self.bind(arg, graph)?);
        }

        let filter = Filter {
            owner: query.owner,
            kind: query.kind,
            topology,
            args: &args,
            rules: &self.rules,
            tolerance: self.tolerance,
            max_rule_depth: self.max_rule_depth,
        };

        let candidates: BTreeSet<_> = match &query.base {
            None => filter.all(),
            Some(QueryArg::Node(n)) if *n == query.owner => filter.all(),
            Some(base) => {
                let set = self.selection(base).ok_or_else(|| QueryError::ArgMismatch {
                    index: query.args.len(),
                    reason: "used as base is a whole feature of another node".to_string(),
                })?;
                if set.owner() != query.owner || set.kind() != query.kind {
                    return Err(QueryError::BaseMismatch {
                        owner: query.owner,
                        kind: query.kind,
                        found_owner: set.owner(),
                        found_kind: set.kind(),
                    });
                }
                set.iter().collect()
            }
        };

        let matched = filter.apply(&query.predicate, &candidates)?;
        if query.cardinality == Cardinality::ExactlyOne && matched.len() != 1 {
            return Err(QueryError::Cardinality {
                query: id,
                expected: query.cardinality,
                found: matched.len(),
            });
        }
        Ok(FeatureSet::from_ids(query.owner, query.kind, matched))
    }

    fn bind<'s>(&'s self, arg: &'s QueryArg, graph: &'s FeatureGraph) -> Result<BoundArg<'s>, QueryError> {
        let topology = |n: NodeId| -> Result<&'s Topology, QueryError> {
            Ok(graph.artifact(n)?.topology())
        };
        Ok(match arg {
            QueryArg::Node(n) => BoundArg::Node(topology(*n)?),
            QueryArg::Set(set) => BoundArg::Set {
                topology: topology(set.owner())?,
                set,
            },
            QueryArg::Query(q) => {
                let set = self
                    .get(*q)?
                    .result()
                    .ok_or(QueryError::UnknownQuery(*q))?;
                BoundArg::Set {
                    topology: topology(set.owner())?,
                    set,
                }
            }
        })
    }
}
