//! The boundary to the external geometry engine.
//!
//! The evaluator never constructs geometry itself. For every cache miss it
//! hands the engine a [`BuildInput`] (resolved parameters plus the built
//! artifacts of the node's dependencies) and receives a [`BuildOutput`] or
//! a [`BuildFailure`].

use forma_common::{Value, Vec3};
use forma_graph::{Artifact, FeatureGraph, NodeId, Param, SubArtifact};
use forma_query::{QuerySpec, SetSpec};

/// Why an engine refused to produce a node.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildFailure {
    /// A parameter is missing, mistyped or out of range.
    #[error("parameter `{name}`: {message}")]
    Parameter {
        /// The offending parameter.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// The geometric operation itself failed (degenerate boolean, radius
    /// larger than an edge, self-intersecting sweep).
    #[error("{0}")]
    Rejected(String),
}

impl BuildFailure {
    /// Shorthand for [`BuildFailure::Parameter`].
    pub fn parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        BuildFailure::Parameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`BuildFailure::Rejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        BuildFailure::Rejected(message.into())
    }
}

/// A geometry engine.
///
/// Implementations are treated as black boxes: the evaluator assumes no
/// internal caching and calls `build` at most once per node per pass.
pub trait GeometryEngine {
    /// Validates parameters before the node enters `Building`.
    ///
    /// Failures returned here are reported as parameter errors and leave
    /// the node `Unbuilt`.
    fn check_parameters(&self, input: &BuildInput<'_>) -> Result<(), BuildFailure> {
        let _ = input;
        Ok(())
    }

    /// Builds a node whose dependencies are all built.
    fn build(&self, input: &BuildInput<'_>) -> Result<BuildOutput, BuildFailure>;
}

/// Everything an engine may read while building one node.
pub struct BuildInput<'a> {
    pub(crate) node: NodeId,
    pub(crate) type_tag: &'a str,
    pub(crate) label: Option<&'a str>,
    pub(crate) params: &'a [Param],
    pub(crate) inputs: Vec<&'a Artifact>,
    pub(crate) deps: &'a [NodeId],
    pub(crate) graph: &'a FeatureGraph,
}

impl<'a> BuildInput<'a> {
    /// The node being built. Only meaningful within the current graph.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The operation kind.
    pub fn type_tag(&self) -> &'a str {
        self.type_tag
    }

    /// The script label, if any.
    pub fn label(&self) -> Option<&'a str> {
        self.label
    }

    /// All parameters in declaration order.
    pub fn params(&self) -> &'a [Param] {
        self.params
    }

    /// Looks up a parameter.
    pub fn param(&self, name: &str) -> Option<&'a Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// A required scalar parameter. Integers widen.
    pub fn scalar(&self, name: &str) -> Result<f64, BuildFailure> {
        let value = self.required(name)?;
        value
            .as_scalar()
            .ok_or_else(|| BuildFailure::parameter(name, format!("expected scalar, got {}", value.kind_name())))
    }

    /// A required vector parameter.
    pub fn vector(&self, name: &str) -> Result<Vec3, BuildFailure> {
        let value = self.required(name)?;
        value
            .as_vector()
            .ok_or_else(|| BuildFailure::parameter(name, format!("expected vector, got {}", value.kind_name())))
    }

    /// The built artifacts of the dependencies, in order.
    pub fn inputs(&self) -> &[&'a Artifact] {
        &self.inputs
    }

    /// The artifact of dependency `index`.
    pub fn input(&self, index: usize) -> Result<&'a Artifact, BuildFailure> {
        self.inputs.get(index).copied().ok_or_else(|| {
            BuildFailure::rejected(format!(
                "{} needs input {index} but has {}",
                self.type_tag,
                self.inputs.len()
            ))
        })
    }

    /// A named sub-artifact of dependency `index`.
    pub fn input_sub_artifact(&self, index: usize, name: &str) -> Result<&'a SubArtifact, BuildFailure> {
        let dep = self.deps.get(index).copied().ok_or_else(|| {
            BuildFailure::rejected(format!("{} has no input {index}", self.type_tag))
        })?;
        self.graph
            .sub_artifact(dep, name)
            .map_err(|e| BuildFailure::rejected(e.to_string()))
    }

    fn required(&self, name: &str) -> Result<&'a Value, BuildFailure> {
        self.param(name)
            .ok_or_else(|| BuildFailure::parameter(name, "missing"))
    }
}

/// A named output of a build, expressed relative to the building node.
#[derive(Clone, Debug)]
pub enum Output {
    /// A sub-shape.
    Shape(Artifact),
    /// A datum value.
    Scalar(f64),
    /// A datum point or direction.
    Vector(Vec3),
    /// A selection of entities of the node or one of its inputs.
    Set(SetSpec),
}

/// What a successful build produces.
///
/// This is the value stored in the feature cache. Selections and queries
/// refer to nodes through [`NodeRef`](forma_graph::NodeRef)s, so a cached
/// output can be re-attached to any node with the same fingerprint.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    artifact: Artifact,
    outputs: Vec<(String, Output)>,
    queries: Vec<(String, QuerySpec)>,
}

impl BuildOutput {
    /// An output with just a main artifact.
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            outputs: Vec::new(),
            queries: Vec::new(),
        }
    }

    /// Publishes a named output.
    pub fn with(mut self, name: impl Into<String>, output: Output) -> Self {
        self.outputs.push((name.into(), output));
        self
    }

    /// Publishes a named scalar.
    pub fn with_scalar(self, name: impl Into<String>, value: f64) -> Self {
        self.with(name, Output::Scalar(value))
    }

    /// Publishes a named selection.
    pub fn with_set(self, name: impl Into<String>, set: SetSpec) -> Self {
        self.with(name, Output::Set(set))
    }

    /// Publishes a named deferred query.
    ///
    /// Queries are attached after all other outputs, in the order given, so
    /// a query may use an earlier output or query of the same build.
    pub fn with_query(mut self, name: impl Into<String>, query: QuerySpec) -> Self {
        self.queries.push((name.into(), query));
        self
    }

    /// The main artifact.
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Named outputs.
    pub fn outputs(&self) -> &[(String, Output)] {
        &self.outputs
    }

    /// Named queries.
    pub fn queries(&self) -> &[(String, QuerySpec)] {
        &self.queries
    }
}
