//! End-to-end rebuild scenarios against a small deterministic workbench.

use std::cell::RefCell;

use forma_common::{FingerprintHasher, Vec3};
use forma_config::FormaConfig;
use forma_diagnostics::{DiagnosticRenderer, DiagnosticSink, Severity, TerminalRenderer};
use forma_eval::report::{E_BUILD, E_CYCLE, E_PARAMETER, W_COLLISION};
use forma_eval::{
    node_fingerprint, BuildFailure, BuildInput, BuildOutput, CancellationToken, Document,
    EvalError, EvalOptions, Evaluator, GeometryEngine, Session,
};
use forma_graph::{
    Aabb, Artifact, BuildState, Entity, EntityId, EntityKind, FeatureGraph, NodeId, NodeRef,
    NodeSpec, SubArtifact, Topology,
};
use forma_query::{
    DeferredQuery, Predicate, QueryArg, QueryError, QuerySpec, RuleBook, SetSpec, SpecArg,
};

/// Builds boxes, cylinders, booleans and fillets as face tables.
///
/// Every face signature is derived from the parameters that define it, so
/// two boxes with equal parameters produce identical faces.
#[derive(Default)]
struct Workbench {
    built: RefCell<Vec<String>>,
    cancel_after: Option<(&'static str, CancellationToken)>,
}

impl Workbench {
    fn cancelling_after(tag: &'static str, token: CancellationToken) -> Self {
        Self {
            built: RefCell::default(),
            cancel_after: Some((tag, token)),
        }
    }

    fn builds(&self) -> Vec<String> {
        self.built.borrow_mut().drain(..).collect()
    }
}

fn face(tag: &str, origin: Vec3, size: f64, index: u32) -> Entity {
    let mut h = FingerprintHasher::new();
    h.combine(tag)
        .combine(&origin.to_array()[..])
        .combine(&size)
        .combine(&(index as i64));
    let far = Vec3::new(origin.x + size, origin.y + size, origin.z + size);
    Entity::new(h.finalize(), Aabb::new(origin, far)).with_metric("area", size * size)
}

fn merged(inputs: &[&Artifact]) -> Topology {
    let mut topology = Topology::new();
    for input in inputs {
        for entity in input.topology().entities(EntityKind::Face) {
            topology.push(EntityKind::Face, entity.clone());
        }
    }
    topology
}

impl GeometryEngine for Workbench {
    fn check_parameters(&self, input: &BuildInput<'_>) -> Result<(), BuildFailure> {
        if input.type_tag() == "Cylinder" && input.scalar("r")? <= 0.0 {
            return Err(BuildFailure::parameter("r", "radius must be positive"));
        }
        Ok(())
    }

    fn build(&self, input: &BuildInput<'_>) -> Result<BuildOutput, BuildFailure> {
        let name = input
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| input.type_tag().to_string());
        self.built.borrow_mut().push(name);
        if let Some((tag, token)) = &self.cancel_after {
            if input.type_tag() == *tag {
                token.cancel();
            }
        }

        match input.type_tag() {
            "Box" => {
                let p0 = input.vector("p0")?;
                let size = input.scalar("size")?;
                let mut topology = Topology::new();
                for i in 0..6 {
                    topology.push(EntityKind::Face, face("Box", p0, size, i));
                }
                Ok(BuildOutput::new(Artifact::new(size.powi(3), topology))
                    .with_scalar("volume", size.powi(3))
                    .with_set(
                        "top",
                        SetSpec::new(NodeRef::Owner, EntityKind::Face, [EntityId::new(6)]),
                    ))
            }
            "Cylinder" => {
                let p0 = input.vector("p0")?;
                let r = input.scalar("r")?;
                let mut topology = Topology::new();
                for i in 0..3 {
                    topology.push(EntityKind::Face, face("Cylinder", p0, r, i));
                }
                Ok(BuildOutput::new(Artifact::new(r, topology)))
            }
            "Union" => Ok(BuildOutput::new(Artifact::new((), merged(input.inputs())))),
            "Compound" => {
                let topology = merged(input.inputs());
                Ok(BuildOutput::new(Artifact::new((), topology)).with_query(
                    "shared",
                    QuerySpec::new(EntityKind::Face, Predicate::IdenticalTo(0))
                        .arg(SpecArg::Set(SetSpec::new(
                            NodeRef::Input(0),
                            EntityKind::Face,
                            [EntityId::new(1)],
                        )))
                        .exactly_one(),
                ))
            }
            "Fillet" => {
                let r = input.scalar("r")?;
                if r >= 1.0 {
                    return Err(BuildFailure::rejected("radius exceeds edge length"));
                }
                let base = input.input(0)?;
                let mut topology = merged(&[base]);
                topology.push(EntityKind::Face, face("Fillet", Vec3::ZERO, r, 0));
                Ok(BuildOutput::new(Artifact::new((), topology)))
            }
            other => Err(BuildFailure::rejected(format!("unknown operation `{other}`"))),
        }
    }
}

struct Model {
    doc: Document,
    bx: NodeId,
    cyl: NodeId,
    root: NodeId,
}

/// `root = Union(Box(p0, 1), Cylinder(p0, r))`, compiled the same way every
/// time it is called.
fn scenario_a(session: &Session, r: f64) -> Model {
    let mut g = FeatureGraph::new();
    let bx = g
        .add_node(NodeSpec::new("Box").label("b").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let cyl = g
        .add_node(NodeSpec::new("Cylinder").label("c").param("p0", Vec3::ZERO).param("r", r))
        .unwrap();
    let root = g
        .add_node(NodeSpec::new("Union").label("root").input(bx).input(cyl))
        .unwrap();
    Model {
        doc: session.document(g, RuleBook::new()),
        bx,
        cyl,
        root,
    }
}

#[test]
fn scenario_a_edit_rebuilds_changed_path_only() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut m = scenario_a(&session, 0.5);

    let first = session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["b", "c", "root"]);
    assert_eq!(first.builds, 3);
    assert_eq!(first.cache.entries, 3);

    m.doc.graph.set_param(m.cyl, "r", 0.75).unwrap();
    let second = session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["c", "root"]);
    assert_eq!(second.builds, 2);
    assert_eq!(second.hits, 1);
    assert_eq!(second.evicted, 2);
    assert_eq!(second.cache.entries, 3);
    assert_eq!(m.doc.graph.node(m.bx).unwrap().state(), BuildState::Built);
    assert!(!sink.has_errors());
}

#[test]
fn reparsed_script_is_all_cache_hits() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();

    let mut first = scenario_a(&session, 0.5);
    session.rebuild(&mut first.doc, &[first.root], &engine, &sink).unwrap();
    engine.builds();

    let mut again = scenario_a(&session, 0.5);
    let report = session.rebuild(&mut again.doc, &[again.root], &engine, &sink).unwrap();
    assert!(engine.builds().is_empty());
    assert_eq!(report.hits, 3);
    assert_eq!(report.evicted, 0);

    // Cached sub-artifacts are re-attached to the new graph's nodes.
    let top = again.doc.selection(again.bx, "top").unwrap();
    assert_eq!(top.owner(), again.bx);
    assert!(matches!(
        again.doc.graph.sub_artifact(again.bx, "volume"),
        Ok(SubArtifact::Scalar(v)) if *v == 1.0
    ));
    assert!(again
        .doc
        .graph
        .artifact(again.root)
        .unwrap()
        .ptr_eq(first.doc.graph.artifact(first.root).unwrap()));
}

#[test]
fn identical_subtrees_fingerprint_identically() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut a = scenario_a(&session, 0.5);
    let mut b = scenario_a(&session, 0.5);
    session.rebuild(&mut a.doc, &[a.root], &engine, &sink).unwrap();
    session.rebuild(&mut b.doc, &[b.root], &engine, &sink).unwrap();
    for (x, y) in [(a.bx, b.bx), (a.cyl, b.cyl), (a.root, b.root)] {
        let fx = a.doc.graph.node(x).unwrap().fingerprint();
        let fy = b.doc.graph.node(y).unwrap().fingerprint();
        assert!(fx.is_some());
        assert_eq!(fx, fy);
    }
    assert_ne!(
        a.doc.graph.node(a.bx).unwrap().fingerprint(),
        a.doc.graph.node(a.cyl).unwrap().fingerprint()
    );
}

#[test]
fn each_node_builds_once_per_pass() {
    let mut m = scenario_a(&Session::default(), 0.5);
    let engine = Workbench::default();
    let mut cache = forma_cache::FeatureCache::new();
    cache.init_rebuild().unwrap();
    let mut evaluator = Evaluator::new(
        &mut m.doc.graph,
        &mut m.doc.queries,
        &mut cache,
        &engine,
        EvalOptions::default(),
    );
    evaluator.evaluate(m.root).unwrap();
    evaluator.evaluate(m.root).unwrap();
    evaluator.evaluate(m.cyl).unwrap();
    assert_eq!(evaluator.stats().builds, 3);
    assert_eq!(evaluator.stats().hits, 0);
    drop(evaluator);
    assert_eq!(engine.builds().len(), 3);
    assert_eq!(cache.finish_rebuild().unwrap(), 0);
}

#[test]
fn unreached_entries_are_swept() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut g = FeatureGraph::new();
    let small = g
        .add_node(NodeSpec::new("Box").label("small").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let large = g
        .add_node(NodeSpec::new("Box").label("large").param("p0", Vec3::ZERO).param("size", 4.0))
        .unwrap();
    let mut doc = session.document(g, RuleBook::new());

    session.rebuild(&mut doc, &[small, large], &engine, &sink).unwrap();
    let small_fp = doc.graph.node(small).unwrap().fingerprint().unwrap();
    let large_fp = doc.graph.node(large).unwrap().fingerprint().unwrap();

    let report = session.rebuild(&mut doc, &[small], &engine, &sink).unwrap();
    assert_eq!(report.evicted, 1);
    let cache = session.cache().lock();
    assert!(cache.contains(&small_fp));
    assert!(!cache.contains(&large_fp));
}

#[test]
fn shared_input_is_never_a_leaf() {
    let session = Session::default();
    let engine = Workbench::default();
    let mut g = FeatureGraph::new();
    let b = g
        .add_node(NodeSpec::new("Box").label("b").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let f1 = g.add_node(NodeSpec::new("Fillet").label("f1").param("r", 0.1).input(b)).unwrap();
    let f2 = g.add_node(NodeSpec::new("Fillet").label("f2").param("r", 0.2).input(b)).unwrap();
    let mut doc = session.document(g, RuleBook::new());
    assert_eq!(doc.graph.leaves(), vec![b, f1, f2]);

    let report = session
        .rebuild_all(&mut doc, &engine, &DiagnosticSink::new())
        .unwrap();
    assert_eq!(report.leaves, vec![f1, f2]);
    assert!(!doc.graph.node(b).unwrap().is_leaf());
    assert_eq!(engine.builds(), ["b", "f1", "f2"]);
}

/// `c = Compound(a, b)` publishing a query for the face of `c` identical to
/// the first face of `a`.
fn scenario_b(session: &Session) -> (Document, NodeId, NodeId, NodeId) {
    let mut g = FeatureGraph::new();
    let a = g
        .add_node(NodeSpec::new("Box").label("a").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let b = g
        .add_node(
            NodeSpec::new("Box")
                .label("b")
                .param("p0", Vec3::new(3.0, 0.0, 0.0))
                .param("size", 1.0),
        )
        .unwrap();
    let c = g
        .add_node(NodeSpec::new("Compound").label("c").input(a).input(b))
        .unwrap();
    (session.document(g, RuleBook::new()), a, b, c)
}

#[test]
fn scenario_b_query_resolves_only_after_owner_is_built() {
    let session = Session::default();
    let engine = Workbench::default();
    let (mut doc, a, _, c) = scenario_b(&session);

    let early = doc
        .queries
        .register(
            DeferredQuery::new(c, EntityKind::Face, Predicate::IdenticalTo(0))
                .arg(QueryArg::Node(a)),
        )
        .unwrap();
    assert!(matches!(
        doc.query(early),
        Err(QueryError::NotReady { state: BuildState::Unbuilt, .. })
    ));
    assert_eq!(doc.queries.get(early).unwrap().evaluations(), 0);

    session
        .rebuild(&mut doc, &[c], &engine, &DiagnosticSink::new())
        .unwrap();

    let shared = doc.selection(c, "shared").unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared.owner(), c);
    let id = shared.single().unwrap();
    let compound = doc.graph.artifact(c).unwrap().topology();
    let box_a = doc.graph.artifact(a).unwrap().topology();
    assert_eq!(
        compound.get(EntityKind::Face, id).unwrap().signature,
        box_a.get(EntityKind::Face, EntityId::new(1)).unwrap().signature
    );

    // Every face of `a` appears once in the compound.
    assert_eq!(doc.query(early).unwrap().len(), 6);
}

#[test]
fn resolved_query_is_memoized() {
    let session = Session::default();
    let engine = Workbench::default();
    let (mut doc, _, _, c) = scenario_b(&session);
    session
        .rebuild(&mut doc, &[c], &engine, &DiagnosticSink::new())
        .unwrap();
    let Ok(SubArtifact::Query(q)) = doc.graph.sub_artifact(c, "shared").cloned() else {
        panic!("compound publishes a query");
    };
    assert!(!doc.queries.is_resolved(q));
    let first = doc.query(q).unwrap().clone();
    let second = doc.query(q).unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(doc.queries.get(q).unwrap().evaluations(), 1);
    assert!(doc.queries.is_resolved(q));
}

#[test]
fn query_becomes_unready_when_its_argument_is_edited() {
    let session = Session::default();
    let engine = Workbench::default();
    let (mut doc, a, _, c) = scenario_b(&session);
    session
        .rebuild(&mut doc, &[c], &engine, &DiagnosticSink::new())
        .unwrap();
    assert!(doc.selection(c, "shared").is_ok());

    doc.graph.set_param(a, "size", 2.0).unwrap();
    assert!(matches!(
        doc.selection(c, "shared"),
        Err(QueryError::NotReady { .. })
    ));

    session
        .rebuild(&mut doc, &[c], &engine, &DiagnosticSink::new())
        .unwrap();
    assert_eq!(doc.selection(c, "shared").unwrap().len(), 1);
}

#[test]
fn ambiguous_query_reports_cardinality() {
    let session = Session::default();
    let engine = Workbench::default();
    let mut g = FeatureGraph::new();
    // Two coincident boxes: the compound holds every face of `a` twice.
    let a = g
        .add_node(NodeSpec::new("Box").label("a").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let b = g
        .add_node(NodeSpec::new("Box").label("b").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let c = g
        .add_node(NodeSpec::new("Compound").label("c").input(a).input(b))
        .unwrap();
    let mut doc = session.document(g, RuleBook::new());
    session
        .rebuild(&mut doc, &[c], &engine, &DiagnosticSink::new())
        .unwrap();
    assert!(matches!(
        doc.selection(c, "shared"),
        Err(QueryError::Cardinality { found: 2, .. })
    ));
}

#[test]
fn memoized_query_follows_a_rebuilt_owner() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let (mut doc, _, _, c) = scenario_b(&session);
    let all = doc
        .queries
        .register(DeferredQuery::new(c, EntityKind::Face, Predicate::Everything))
        .unwrap();

    session.rebuild(&mut doc, &[c], &engine, &sink).unwrap();
    assert_eq!(doc.query(all).unwrap().len(), 12);

    let x = doc
        .graph
        .add_node(
            NodeSpec::new("Box")
                .label("x")
                .param("p0", Vec3::new(0.0, 6.0, 0.0))
                .param("size", 1.0),
        )
        .unwrap();
    doc.graph.add_dependency(c, x).unwrap();
    session.rebuild(&mut doc, &[c], &engine, &sink).unwrap();

    let live = doc.graph.artifact(c).unwrap().topology().count(EntityKind::Face);
    assert_eq!(live, 18);
    assert_eq!(doc.query(all).unwrap().len(), live);
    assert_eq!(doc.queries.get(all).unwrap().evaluations(), 2);
}

#[test]
fn rebuilt_feature_republishes_its_queries_in_place() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let (mut doc, _, b, c) = scenario_b(&session);
    session.rebuild(&mut doc, &[c], &engine, &sink).unwrap();
    let Ok(SubArtifact::Query(shared)) = doc.graph.sub_artifact(c, "shared").cloned() else {
        panic!("compound publishes a query");
    };

    for step in 1..=5 {
        let p0 = Vec3::new(3.0 + f64::from(step), 0.0, 0.0);
        doc.graph.set_param(b, "p0", p0).unwrap();
        session.rebuild(&mut doc, &[c], &engine, &sink).unwrap();
        assert!(matches!(
            doc.graph.sub_artifact(c, "shared"),
            Ok(SubArtifact::Query(q)) if *q == shared
        ));
        assert_eq!(doc.selection(c, "shared").unwrap().len(), 1);
    }
    assert_eq!(doc.queries.len(), 1);
}

#[test]
fn named_rules_resolve_through_the_rule_book() {
    let session = Session::default();
    let engine = Workbench::default();
    let mut g = FeatureGraph::new();
    let small = g
        .add_node(NodeSpec::new("Box").label("small").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let large = g
        .add_node(
            NodeSpec::new("Box")
                .label("large")
                .param("p0", Vec3::new(5.0, 0.0, 0.0))
                .param("size", 2.0),
        )
        .unwrap();
    let u = g.add_node(NodeSpec::new("Union").label("u").input(small).input(large)).unwrap();
    let rules = RuleBook::new().with("largest", Predicate::max("area"));
    let mut doc = session.document(g, rules);
    session
        .rebuild(&mut doc, &[u], &engine, &DiagnosticSink::new())
        .unwrap();

    let q = doc
        .queries
        .register(DeferredQuery::new(u, EntityKind::Face, Predicate::named("largest")))
        .unwrap();
    let picked = doc.query(q).unwrap();
    // Six faces of area 4 tie for the maximum.
    assert_eq!(picked.len(), 6);
    assert!(picked.iter().all(|id| id.get() > 6));
}

#[test]
fn scenario_c_cycle_aborts_pass_without_committing() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut g = FeatureGraph::new();
    let x = g.add_node(NodeSpec::new("Union").label("x")).unwrap();
    let y = g.add_node(NodeSpec::new("Fillet").label("y").param("r", 0.1).input(x)).unwrap();
    g.add_dependency(x, y).unwrap();
    let mut doc = session.document(g, RuleBook::new());

    let err = session.rebuild(&mut doc, &[x], &engine, &sink).unwrap_err();
    match &err {
        EvalError::Cycle { path } => {
            let names: Vec<String> = path.iter().map(ToString::to_string).collect();
            assert_eq!(names, ["x", "y", "x"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert!(engine.builds().is_empty());
    let cache = session.cache().lock();
    assert!(cache.is_empty());
    assert!(!cache.is_rebuilding());
    drop(cache);
    assert_eq!(doc.graph.node(x).unwrap().state(), BuildState::Unbuilt);
    assert_eq!(doc.graph.node(y).unwrap().state(), BuildState::Unbuilt);

    let diags = sink.take_all();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, E_CYCLE);
}

#[test]
fn cycle_below_built_subtree_keeps_committed_entries() {
    let session = Session::default();
    let engine = Workbench::default();
    let mut g = FeatureGraph::new();
    let b = g
        .add_node(NodeSpec::new("Box").label("b").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let x = g.add_node(NodeSpec::new("Union").label("x")).unwrap();
    let y = g.add_node(NodeSpec::new("Fillet").label("y").param("r", 0.1).input(x)).unwrap();
    g.add_dependency(x, y).unwrap();
    let root = g.add_node(NodeSpec::new("Union").label("root").input(b).input(y)).unwrap();
    let mut doc = session.document(g, RuleBook::new());

    let err = session
        .rebuild(&mut doc, &[root], &engine, &DiagnosticSink::new())
        .unwrap_err();
    assert!(matches!(err, EvalError::Cycle { .. }));
    assert_eq!(engine.builds(), ["b"]);
    assert_eq!(session.cache().stats().entries, 1);
}

/// `top = Union(Fillet(c, r), Cylinder)` with `c` a box.
fn scenario_d(session: &Session, r: f64) -> (Document, NodeId, NodeId, NodeId) {
    let mut g = FeatureGraph::new();
    let c = g
        .add_node(NodeSpec::new("Box").label("c").param("p0", Vec3::ZERO).param("size", 1.0))
        .unwrap();
    let p = g.add_node(NodeSpec::new("Fillet").label("p").param("r", r).input(c)).unwrap();
    let cyl = g
        .add_node(
            NodeSpec::new("Cylinder")
                .label("cyl")
                .param("p0", Vec3::new(0.0, 4.0, 0.0))
                .param("r", 0.5),
        )
        .unwrap();
    let top = g.add_node(NodeSpec::new("Union").label("top").input(p).input(cyl)).unwrap();
    (session.document(g, RuleBook::new()), c, p, top)
}

#[test]
fn scenario_d_failures_are_retried_and_never_cached() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let (mut doc, c, p, top) = scenario_d(&session, 2.0);

    let first = session.rebuild(&mut doc, &[top], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["c", "p", "cyl"]);
    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.cache.entries, 2);
    assert_eq!(doc.graph.node(p).unwrap().state(), BuildState::Failed);
    assert_eq!(doc.graph.node(top).unwrap().state(), BuildState::Unbuilt);

    let second = session.rebuild(&mut doc, &[top], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["p"]);
    assert_eq!(second.hits, 2);
    assert_eq!(second.evicted, 0);
    assert_eq!(doc.graph.node(c).unwrap().state(), BuildState::Built);

    doc.graph.set_param(p, "r", 0.25).unwrap();
    let fixed = session.rebuild(&mut doc, &[top], &engine, &sink).unwrap();
    assert!(fixed.is_clean());
    assert_eq!(engine.builds(), ["p", "top"]);
    assert_eq!(doc.graph.node(top).unwrap().state(), BuildState::Built);
}

#[test]
fn build_failure_diagnostic_names_the_feature_and_its_parents() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let (mut doc, _, _, top) = scenario_d(&session, 2.0);
    session.rebuild(&mut doc, &[top], &engine, &sink).unwrap();

    let diags = sink.take_all();
    assert_eq!(diags.len(), 1);
    let diag = &diags[0];
    assert_eq!(diag.code, E_BUILD);
    assert_eq!(diag.severity, Severity::Error);
    let text = TerminalRenderer::new(false).render(diag);
    assert!(text.contains("failed to build `p`: radius exceeds edge length"));
    assert!(text.contains("--> `p` (Fillet)"));
    assert!(text.contains("while building `top` (Union)"));
}

#[test]
fn sibling_entries_survive_a_failure_when_evaluation_continues() {
    for (continue_after_failure, entries, evicted) in [(true, 2, 2), (false, 1, 3)] {
        let mut config = FormaConfig::default();
        config.evaluator.continue_after_failure = continue_after_failure;
        let session = Session::new(config);
        let engine = Workbench::default();
        let sink = DiagnosticSink::new();
        let (mut doc, _, p, top) = scenario_d(&session, 0.5);
        session.rebuild(&mut doc, &[top], &engine, &sink).unwrap();
        assert_eq!(session.cache().stats().entries, 4);

        doc.graph.set_param(p, "r", 3.0).unwrap();
        let report = session.rebuild(&mut doc, &[top], &engine, &sink).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.cache.entries, entries);
        assert_eq!(report.evicted, evicted);
    }
}

#[test]
fn parameter_error_is_reported_before_building() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut m = scenario_a(&session, -1.0);
    let report = session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["b"]);
    assert!(matches!(
        &report.failures[..],
        [EvalError::Parameter { name, .. }] if name == "r"
    ));
    assert_eq!(m.doc.graph.node(m.cyl).unwrap().state(), BuildState::Unbuilt);
    assert_eq!(sink.take_all()[0].code, E_PARAMETER);
}

#[test]
fn cancelled_pass_keeps_completed_nodes() {
    let session = Session::default();
    let engine = Workbench::cancelling_after("Box", session.cancellation());
    let sink = DiagnosticSink::new();
    let mut m = scenario_a(&session, 0.5);

    let err = session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap_err();
    assert!(matches!(&err, EvalError::Cancelled { before } if before.label.as_deref() == Some("c")));
    assert_eq!(engine.builds(), ["b"]);
    assert_eq!(session.cache().stats().entries, 1);

    let plain = Workbench::default();
    let report = session.rebuild(&mut m.doc, &[m.root], &plain, &sink).unwrap();
    assert_eq!(plain.builds(), ["c", "root"]);
    assert_eq!(report.hits, 1);
}

#[test]
fn recipe_mismatch_is_a_collision_and_rebuilds() {
    let session = Session::default();
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut m = scenario_a(&session, 0.5);
    let (fp, _) = node_fingerprint(&m.doc.graph, m.bx, &[], false).unwrap();

    let mut other = FingerprintHasher::recording();
    other.combine("something else");
    let (_, forged) = other.finalize_with_recipe();
    let impostor = BuildOutput::new(Artifact::new(0.0_f64, Topology::new()));
    session.cache().lock().put(fp, impostor, forged.clone());

    let report = session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["b", "c", "root"]);
    assert_eq!(report.cache.collisions, 1);
    let diags = sink.take_all();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, W_COLLISION);
    assert_eq!(diags[0].severity, Severity::Warning);

    let cache = session.cache().lock();
    let entry = cache.entry(&fp).unwrap();
    assert_ne!(entry.recipe, forged);
    assert_eq!(entry.value.artifact().topology().count(EntityKind::Face), 6);
}

#[test]
fn without_verification_a_matching_fingerprint_is_trusted() {
    let mut config = FormaConfig::default();
    config.cache.verify_recipes = false;
    let session = Session::new(config);
    let engine = Workbench::default();
    let sink = DiagnosticSink::new();
    let mut m = scenario_a(&session, 0.5);
    let (fp, _) = node_fingerprint(&m.doc.graph, m.bx, &[], false).unwrap();

    let mut other = FingerprintHasher::recording();
    other.combine("something else");
    let (_, forged) = other.finalize_with_recipe();
    let impostor = BuildOutput::new(Artifact::new(0.0_f64, Topology::new()));
    session.cache().lock().put(fp, impostor, forged);

    session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["c", "root"]);
    assert_eq!(sink.warning_count(), 0);
    assert_eq!(
        m.doc.graph.artifact(m.bx).unwrap().shape::<f64>(),
        Some(&0.0)
    );
}

/// Panics inside every build.
struct Exploding;

impl GeometryEngine for Exploding {
    fn build(&self, _: &BuildInput<'_>) -> Result<BuildOutput, BuildFailure> {
        panic!("kernel crashed");
    }
}

#[test]
fn engine_panic_does_not_wedge_the_session() {
    let session = Session::default();
    let sink = DiagnosticSink::new();
    let mut m = scenario_a(&session, 0.5);

    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        session.rebuild(&mut m.doc, &[m.root], &Exploding, &sink)
    }));
    assert!(crashed.is_err());
    assert!(!session.cache().lock().is_rebuilding());

    let engine = Workbench::default();
    let report = session.rebuild(&mut m.doc, &[m.root], &engine, &sink).unwrap();
    assert_eq!(engine.builds(), ["b", "c", "root"]);
    assert_eq!(report.generation, 2);
    assert_eq!(m.doc.graph.node(m.bx).unwrap().state(), BuildState::Built);
}
