//! Rebuild passes over a document, driven against a shared cache.

use std::path::Path;

use forma_cache::{CacheStats, SharedCache};
use forma_config::{load_config, ConfigError, FormaConfig};
use forma_diagnostics::DiagnosticSink;
use forma_graph::{FeatureGraph, FeatureSet, NodeId, QueryId, SubArtifact};
use forma_query::{QueryError, QueryStore, RuleBook};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::engine::{BuildOutput, GeometryEngine};
use crate::error::EvalError;
use crate::evaluator::{EvalOptions, Evaluator};
use crate::report;

/// A compiled script: its feature graph and the queries its builds created.
pub struct Document {
    /// The feature graph.
    pub graph: FeatureGraph,
    /// Deferred queries registered by builds and cache hits.
    pub queries: QueryStore,
}

impl Document {
    /// Pairs a graph with a query store.
    pub fn new(graph: FeatureGraph, queries: QueryStore) -> Self {
        Self { graph, queries }
    }

    /// Resolves a deferred query, memoizing the result.
    pub fn query(&mut self, id: QueryId) -> Result<&FeatureSet, QueryError> {
        self.queries.resolve(id, &self.graph)
    }

    /// Returns the selection a node published under `name`, resolving it
    /// first when it is a deferred query.
    pub fn selection(&mut self, node: NodeId, name: &str) -> Result<FeatureSet, QueryError> {
        match self.graph.sub_artifact(node, name)? {
            SubArtifact::Set(set) => Ok(set.clone()),
            SubArtifact::Query(id) => {
                let id = *id;
                Ok(self.queries.resolve(id, &self.graph)?.clone())
            }
            other => Err(QueryError::NotASelection {
                node: self.graph.display_name(node),
                name: name.to_string(),
                found: other.kind_name(),
            }),
        }
    }
}

/// Outcome of a completed rebuild pass.
#[derive(Clone, Debug)]
pub struct RebuildReport {
    /// Cache generation of the pass.
    pub generation: u64,
    /// `build()` invocations.
    pub builds: usize,
    /// Nodes served from the cache.
    pub hits: usize,
    /// Entries swept at the end of the pass.
    pub evicted: usize,
    /// Features that failed, one error per originating feature.
    pub failures: Vec<EvalError>,
    /// Terminal nodes of the graph after the pass.
    pub leaves: Vec<NodeId>,
    /// Cache counters after the sweep.
    pub cache: CacheStats,
}

impl RebuildReport {
    /// Returns `true` if every root was built.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the cache and configuration shared by successive rebuilds.
///
/// Cloning the [`SharedCache`] handed to [`with_cache`](Self::with_cache)
/// lets other threads read cache statistics while a pass runs; the pass
/// holds the cache lock from `init_rebuild` to the sweep.
pub struct Session {
    cache: SharedCache<BuildOutput>,
    config: FormaConfig,
    cancel: CancellationToken,
}

impl Session {
    /// Creates a session with an empty cache.
    pub fn new(config: FormaConfig) -> Self {
        Self::with_cache(config, SharedCache::default())
    }

    /// Creates a session around an existing cache.
    pub fn with_cache(config: FormaConfig, cache: SharedCache<BuildOutput>) -> Self {
        Self {
            cache,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a session configured from `<dir>/forma.toml`, or with the
    /// defaults when the directory has no such file.
    pub fn open(dir: &Path) -> Result<Self, ConfigError> {
        let config = load_config(dir)?;
        debug!(dir = %dir.display(), "configuration loaded");
        Ok(Self::new(config))
    }

    /// The loaded configuration.
    pub fn config(&self) -> &FormaConfig {
        &self.config
    }

    /// The cache shared by every pass of this session.
    pub fn cache(&self) -> &SharedCache<BuildOutput> {
        &self.cache
    }

    /// A token that cancels the running pass, or the next one if none is
    /// running.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wraps a freshly compiled graph with an empty query store configured
    /// for this session.
    pub fn document(&self, graph: FeatureGraph, rules: RuleBook) -> Document {
        Document::new(graph, QueryStore::new(rules, &self.config.query))
    }

    /// Runs one rebuild pass over `roots`.
    ///
    /// Failed features are reported to `sink` and listed in the report; the
    /// pass still completes and sweeps. A cycle, a cancellation or an
    /// internal error aborts the pass without sweeping and is returned.
    pub fn rebuild<E: GeometryEngine + ?Sized>(
        &self,
        doc: &mut Document,
        roots: &[NodeId],
        engine: &E,
        sink: &DiagnosticSink,
    ) -> Result<RebuildReport, EvalError> {
        let mut cache = self.cache.lock();
        let generation = cache.init_rebuild()?;
        debug!(generation, roots = roots.len(), "rebuild started");

        let mut failures: Vec<EvalError> = Vec::new();
        let mut aborted = None;
        let stats = {
            let mut evaluator = Evaluator::new(
                &mut doc.graph,
                &mut doc.queries,
                &mut *cache,
                engine,
                EvalOptions::from(&self.config),
            )
            .with_cancellation(self.cancel.clone());
            for &root in roots {
                match evaluator.evaluate(root) {
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => {
                        aborted = Some(err);
                        break;
                    }
                    Err(err) => {
                        let origin = err.feature().map(|f| f.id);
                        if !failures.iter().any(|f| f.feature().map(|f| f.id) == origin) {
                            failures.push(err);
                        }
                    }
                }
            }
            evaluator.into_stats()
        };

        for feature in &stats.collisions {
            sink.emit(report::collision(feature));
        }
        for err in &failures {
            sink.emit(report::diagnostic(err));
        }

        if let Some(err) = aborted {
            cache.abandon_rebuild()?;
            sink.emit(report::diagnostic(&err));
            if matches!(err, EvalError::Cancelled { .. }) {
                self.cancel.reset();
            }
            warn!(generation, error = %err, "rebuild aborted");
            return Err(err);
        }

        let evicted = cache.finish_rebuild()?;
        let report = RebuildReport {
            generation,
            builds: stats.builds,
            hits: stats.hits,
            evicted,
            failures,
            leaves: doc.graph.leaves(),
            cache: cache.stats(),
        };
        info!(
            generation,
            builds = report.builds,
            hits = report.hits,
            evicted,
            failures = report.failures.len(),
            "rebuild finished"
        );
        Ok(report)
    }

    /// Rebuilds every node of the document.
    pub fn rebuild_all<E: GeometryEngine + ?Sized>(
        &self,
        doc: &mut Document,
        engine: &E,
        sink: &DiagnosticSink,
    ) -> Result<RebuildReport, EvalError> {
        let roots: Vec<NodeId> = doc.graph.node_ids().collect();
        self.rebuild(doc, &roots, engine, sink)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(FormaConfig::default())
    }
}
