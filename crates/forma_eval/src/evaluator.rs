//! Post-order evaluation of a feature graph against the feature cache.
//!
//! One [`Evaluator`] lives for one rebuild pass. It walks dependencies
//! depth-first, marking each node in progress while its dependencies are
//! visited; meeting an in-progress node again is a cycle and reported with
//! the path that closed it. Every node is fingerprinted once per pass and
//! the fingerprint decides between adopting a cached build output and
//! calling the geometry engine.

use std::collections::HashMap;

use forma_cache::{FeatureCache, Lookup};
use forma_common::{Fingerprint, Recipe};
use forma_config::FormaConfig;
use forma_graph::{Artifact, BuildState, FeatureGraph, NodeId, SubArtifact};
use forma_query::{QueryError, QueryStore};
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::engine::{BuildFailure, BuildInput, BuildOutput, GeometryEngine, Output};
use crate::error::{EvalError, FeatureRef};
use crate::fingerprint::node_fingerprint;

/// Evaluator switches, usually taken from [`FormaConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvalOptions {
    /// Record fingerprint recipes and compare them on cache hits.
    pub verify_recipes: bool,
    /// Keep visiting a node's remaining dependencies after one fails.
    pub continue_after_failure: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self::from(&FormaConfig::default())
    }
}

impl From<&FormaConfig> for EvalOptions {
    fn from(config: &FormaConfig) -> Self {
        Self {
            verify_recipes: config.cache.verify_recipes,
            continue_after_failure: config.evaluator.continue_after_failure,
        }
    }
}

/// Counters for one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// `build()` invocations, successful or not.
    pub builds: usize,
    /// Nodes served from the cache.
    pub hits: usize,
    /// Nodes whose parameters or build were rejected.
    pub failures: usize,
    /// Nodes whose fingerprint matched an entry built from other inputs.
    pub collisions: Vec<FeatureRef>,
}

enum Mark {
    InProgress,
    Done(Fingerprint),
    Failed(EvalError),
}

/// Evaluates nodes of one graph for one rebuild pass.
///
/// The cache must already be inside `init_rebuild`; the evaluator only
/// looks up, stores and marks entries.
pub struct Evaluator<'a, E: GeometryEngine + ?Sized> {
    graph: &'a mut FeatureGraph,
    queries: &'a mut QueryStore,
    cache: &'a mut FeatureCache<BuildOutput>,
    engine: &'a E,
    options: EvalOptions,
    cancel: CancellationToken,
    marks: HashMap<NodeId, Mark>,
    stack: Vec<NodeId>,
    stats: EvalStats,
}

impl<'a, E: GeometryEngine + ?Sized> Evaluator<'a, E> {
    /// Creates an evaluator for one pass.
    pub fn new(
        graph: &'a mut FeatureGraph,
        queries: &'a mut QueryStore,
        cache: &'a mut FeatureCache<BuildOutput>,
        engine: &'a E,
        options: EvalOptions,
    ) -> Self {
        Self {
            graph,
            queries,
            cache,
            engine,
            options,
            cancel: CancellationToken::new(),
            marks: HashMap::new(),
            stack: Vec::new(),
            stats: EvalStats::default(),
        }
    }

    /// Uses `token` to allow the pass to be stopped between nodes.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Evaluates `root` and everything it depends on.
    ///
    /// Evaluating a node a second time in the same pass returns the first
    /// outcome without doing any work.
    pub fn evaluate(&mut self, root: NodeId) -> Result<Artifact, EvalError> {
        self.visit(root)?;
        Ok(self.graph.artifact(root)?.clone())
    }

    /// The fingerprint computed for a node during this pass.
    pub fn fingerprint(&self, id: NodeId) -> Option<Fingerprint> {
        match self.marks.get(&id) {
            Some(Mark::Done(fp)) => Some(*fp),
            _ => None,
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> &EvalStats {
        &self.stats
    }

    /// Ends the pass and returns its counters.
    pub fn into_stats(self) -> EvalStats {
        self.stats
    }

    fn visit(&mut self, id: NodeId) -> Result<Fingerprint, EvalError> {
        match self.marks.get(&id) {
            Some(Mark::Done(fp)) => return Ok(*fp),
            Some(Mark::InProgress) => return Err(self.cycle(id)),
            Some(Mark::Failed(err)) => return Err(err.clone()),
            None => {}
        }
        self.graph.node(id)?;
        if self.cancel.is_cancelled() {
            let before = FeatureRef::of(self.graph, id);
            debug!(node = %before, "rebuild cancelled");
            return Err(EvalError::Cancelled { before });
        }

        self.marks.insert(id, Mark::InProgress);
        self.stack.push(id);
        let result = self.visit_dependencies(id);
        self.stack.pop();

        match &result {
            Ok(fp) => {
                self.marks.insert(id, Mark::Done(*fp));
            }
            Err(err) => {
                // Whatever the node held is no longer backed by this pass.
                let node = self.graph.node_mut(id)?;
                if node.state() != BuildState::Failed {
                    node.invalidate();
                }
                self.marks.insert(id, Mark::Failed(err.clone()));
            }
        }
        result
    }

    fn visit_dependencies(&mut self, id: NodeId) -> Result<Fingerprint, EvalError> {
        let deps = self.graph.node(id)?.dependencies().to_vec();
        let mut fingerprints = Vec::with_capacity(deps.len());
        let mut failed = None;
        for dep in deps {
            let result = self.visit(dep);
            self.graph.use_node(dep)?;
            match result {
                Ok(fp) => fingerprints.push(fp),
                Err(err) if err.is_fatal() || !self.options.continue_after_failure => {
                    return Err(err)
                }
                Err(err) => {
                    failed.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failed {
            return Err(err);
        }
        self.resolve(id, &fingerprints)
    }

    fn resolve(&mut self, id: NodeId, deps: &[Fingerprint]) -> Result<Fingerprint, EvalError> {
        let (fp, recipe) = node_fingerprint(self.graph, id, deps, self.options.verify_recipes)?;
        let node = self.graph.node(id)?;
        let current = node.state() == BuildState::Built && node.fingerprint() == Some(fp);

        let cached = match self.cache.lookup(&fp, recipe.as_ref()) {
            Lookup::Hit(output) => Some(output.clone()),
            Lookup::Miss => None,
            Lookup::Collision => {
                let feature = FeatureRef::of(self.graph, id);
                warn!(node = %feature, fingerprint = %fp, "fingerprint collision, rebuilding");
                self.stats.collisions.push(feature);
                None
            }
        };

        match cached {
            Some(output) => {
                self.cache.mark_used(&fp)?;
                self.stats.hits += 1;
                if !current {
                    self.adopt(id, fp, &output)?;
                }
                debug!(node = %FeatureRef::of(self.graph, id), fingerprint = %fp, "cache hit");
            }
            None => {
                let node = self.graph.node_mut(id)?;
                if node.state() != BuildState::Unbuilt {
                    node.invalidate();
                }
                self.build(id, fp, recipe)?;
            }
        }
        Ok(fp)
    }

    fn adopt(&mut self, id: NodeId, fp: Fingerprint, output: &BuildOutput) -> Result<(), EvalError> {
        let node = self.graph.node_mut(id)?;
        if node.state() != BuildState::Unbuilt {
            node.invalidate();
        }
        let subs = match self.attach(id, output) {
            Ok(subs) => subs,
            Err(e) => return Err(self.failure(id, BuildFailure::rejected(e.to_string()))),
        };
        self.graph
            .node_mut(id)?
            .adopt(fp, output.artifact().clone(), subs)?;
        Ok(())
    }

    fn build(&mut self, id: NodeId, fp: Fingerprint, recipe: Option<Recipe>) -> Result<(), EvalError> {
        let checked = {
            let input = self.input(id)?;
            self.engine.check_parameters(&input)
        };
        if let Err(failure) = checked {
            return Err(self.failure(id, failure));
        }

        self.graph.node_mut(id)?.begin_build()?;
        debug!(node = %FeatureRef::of(self.graph, id), fingerprint = %fp, "building");
        let built = {
            let input = self.input(id)?;
            self.engine.build(&input)
        };
        self.stats.builds += 1;

        let output = match built {
            Ok(output) => output,
            Err(failure) => {
                self.graph.node_mut(id)?.fail_build()?;
                return Err(self.failure(id, failure));
            }
        };
        let subs = match self.attach(id, &output) {
            Ok(subs) => subs,
            Err(e) => {
                self.graph.node_mut(id)?.fail_build()?;
                return Err(self.failure(id, BuildFailure::rejected(e.to_string())));
            }
        };
        self.graph
            .node_mut(id)?
            .finish_build(fp, output.artifact().clone(), subs)?;
        self.cache.put(fp, output, recipe);
        Ok(())
    }

    /// Turns relative outputs into sub-artifacts of `id`, publishing its
    /// queries unresolved in place of those of its previous build.
    fn attach(
        &mut self,
        id: NodeId,
        output: &BuildOutput,
    ) -> Result<HashMap<String, SubArtifact>, QueryError> {
        let mut subs = HashMap::with_capacity(output.outputs().len() + output.queries().len());
        for (name, out) in output.outputs() {
            let sub = match out {
                Output::Shape(a) => SubArtifact::Shape(a.clone()),
                Output::Scalar(v) => SubArtifact::Scalar(*v),
                Output::Vector(v) => SubArtifact::Vector(*v),
                Output::Set(spec) => SubArtifact::Set(spec.attach(id, self.graph)?),
            };
            subs.insert(name.clone(), sub);
        }
        for (name, spec) in output.queries() {
            let query = spec.instantiate(id, self.graph, &subs)?;
            let qid = self.queries.publish(id, name, query)?;
            subs.insert(name.clone(), SubArtifact::Query(qid));
        }
        self.queries
            .retain_published(id, |name| output.queries().iter().any(|(n, _)| n == name));
        Ok(subs)
    }

    fn input(&self, id: NodeId) -> Result<BuildInput<'_>, EvalError> {
        let graph: &FeatureGraph = &*self.graph;
        let node = graph.node(id)?;
        let mut inputs = Vec::with_capacity(node.dependencies().len());
        for dep in node.dependencies() {
            inputs.push(graph.artifact(*dep)?);
        }
        Ok(BuildInput {
            node: id,
            type_tag: graph.type_name(id)?,
            label: node.label(),
            params: node.params(),
            inputs,
            deps: node.dependencies(),
            graph,
        })
    }

    fn failure(&mut self, id: NodeId, failure: BuildFailure) -> EvalError {
        self.stats.failures += 1;
        let feature = FeatureRef::of(self.graph, id);
        let within = self
            .stack
            .iter()
            .rev()
            .skip(1)
            .map(|n| FeatureRef::of(self.graph, *n))
            .collect();
        warn!(node = %feature, error = %failure, "feature failed");
        match failure {
            BuildFailure::Parameter { name, message } => EvalError::Parameter {
                feature,
                name,
                message,
                within,
            },
            BuildFailure::Rejected(message) => EvalError::Build {
                feature,
                message,
                within,
            },
        }
    }

    fn cycle(&self, id: NodeId) -> EvalError {
        let start = self.stack.iter().position(|n| *n == id).unwrap_or(0);
        let mut path: Vec<FeatureRef> = self.stack[start..]
            .iter()
            .map(|n| FeatureRef::of(self.graph, *n))
            .collect();
        path.push(FeatureRef::of(self.graph, id));
        let err = EvalError::Cycle { path };
        warn!(%err, "cycle detected");
        err
    }
}
