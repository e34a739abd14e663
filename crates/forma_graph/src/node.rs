//! Feature nodes and their build state machine.

use crate::artifact::Artifact;
use crate::feature_set::FeatureSet;
use crate::ids::{NodeId, QueryId};
use forma_common::{Fingerprint, FormaResult, InternalError, TypeTag, Value, Vec3};
use std::collections::HashMap;
use std::fmt;

/// Build state of a feature node.
///
/// `Unbuilt → Building → Built` on success, `Unbuilt → Building → Failed`
/// on failure. A cache hit moves `Unbuilt → Built` directly, without ever
/// entering `Building`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BuildState {
    /// Not yet evaluated, or invalidated by an edit.
    Unbuilt,
    /// `build()` is running.
    Building,
    /// Artifact and sub-artifacts are available.
    Built,
    /// The last build attempt failed.
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Unbuilt => write!(f, "unbuilt"),
            BuildState::Building => write!(f, "building"),
            BuildState::Built => write!(f, "built"),
            BuildState::Failed => write!(f, "failed"),
        }
    }
}

/// A named parameter of a feature node.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Parameter name as written in the script (`p0`, `L`, `radius`).
    pub name: String,
    /// Resolved value.
    pub value: Value,
}

/// A reference to a node relative to the node being built.
///
/// Build outputs describe the sets and queries they create with relative
/// references so that a cached output can be re-attached to a freshly
/// parsed graph, where the same inputs have different [`NodeId`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeRef {
    /// The node being built.
    Owner,
    /// The dependency at this position.
    Input(usize),
}

/// A named secondary output of a node's build.
#[derive(Clone, Debug)]
pub enum SubArtifact {
    /// A sub-shape.
    Shape(Artifact),
    /// A reference scalar (datum value).
    Scalar(f64),
    /// A reference point or direction.
    Vector(Vec3),
    /// A concrete selection of entities.
    Set(FeatureSet),
    /// A deferred selection, resolved on first access.
    Query(QueryId),
}

impl SubArtifact {
    /// Returns a short name for the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SubArtifact::Shape(_) => "shape",
            SubArtifact::Scalar(_) => "scalar",
            SubArtifact::Vector(_) => "vector",
            SubArtifact::Set(_) => "feature set",
            SubArtifact::Query(_) => "deferred query",
        }
    }
}

/// One unit of the feature DAG.
#[derive(Debug)]
pub struct FeatureNode {
    pub(crate) type_tag: TypeTag,
    pub(crate) label: Option<String>,
    pub(crate) params: Vec<Param>,
    pub(crate) deps: Vec<NodeId>,
    state: BuildState,
    pub(crate) is_leaf: bool,
    fingerprint: Option<Fingerprint>,
    artifact: Option<Artifact>,
    sub_artifacts: HashMap<String, SubArtifact>,
}

impl FeatureNode {
    pub(crate) fn new(
        type_tag: TypeTag,
        label: Option<String>,
        params: Vec<Param>,
        deps: Vec<NodeId>,
    ) -> Self {
        Self {
            type_tag,
            label,
            params,
            deps,
            state: BuildState::Unbuilt,
            is_leaf: true,
            fingerprint: None,
            artifact: None,
            sub_artifacts: HashMap::new(),
        }
    }

    /// The interned operation kind. Resolve it through the owning graph.
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// The script symbol this node was bound to, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Ordered parameters.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Ordered dependencies.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.deps
    }

    /// Current build state.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// `true` while no other node has adopted this one as a dependency.
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Fingerprint of the last successful evaluation.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    /// The built artifact, if the node is built.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// All named sub-artifacts of the last build.
    pub fn sub_artifacts(&self) -> &HashMap<String, SubArtifact> {
        &self.sub_artifacts
    }

    /// Enters `build()`.
    ///
    /// Building is only legal from `Unbuilt`; anything else means the
    /// evaluator re-entered a node.
    pub fn begin_build(&mut self) -> FormaResult<()> {
        if self.state != BuildState::Unbuilt {
            return Err(InternalError::new(format!(
                "build entered from state `{}`",
                self.state
            )));
        }
        self.state = BuildState::Building;
        Ok(())
    }

    /// Records a successful build.
    pub fn finish_build(
        &mut self,
        fingerprint: Fingerprint,
        artifact: Artifact,
        sub_artifacts: HashMap<String, SubArtifact>,
    ) -> FormaResult<()> {
        if self.state != BuildState::Building {
            return Err(InternalError::new(format!(
                "build finished from state `{}`",
                self.state
            )));
        }
        self.set_built(fingerprint, artifact, sub_artifacts);
        Ok(())
    }

    /// Records a failed build. The node keeps no artifact.
    pub fn fail_build(&mut self) -> FormaResult<()> {
        if self.state != BuildState::Building {
            return Err(InternalError::new(format!(
                "build failed from state `{}`",
                self.state
            )));
        }
        self.state = BuildState::Failed;
        self.fingerprint = None;
        self.artifact = None;
        self.sub_artifacts.clear();
        Ok(())
    }

    /// Adopts a cached result without building.
    pub fn adopt(
        &mut self,
        fingerprint: Fingerprint,
        artifact: Artifact,
        sub_artifacts: HashMap<String, SubArtifact>,
    ) -> FormaResult<()> {
        if self.state != BuildState::Unbuilt {
            return Err(InternalError::new(format!(
                "cache result adopted in state `{}`",
                self.state
            )));
        }
        self.set_built(fingerprint, artifact, sub_artifacts);
        Ok(())
    }

    /// Drops any result and returns the node to `Unbuilt`.
    pub fn invalidate(&mut self) {
        self.state = BuildState::Unbuilt;
        self.fingerprint = None;
        self.artifact = None;
        self.sub_artifacts.clear();
    }

    fn set_built(
        &mut self,
        fingerprint: Fingerprint,
        artifact: Artifact,
        sub_artifacts: HashMap<String, SubArtifact>,
    ) {
        self.state = BuildState::Built;
        self.fingerprint = Some(fingerprint);
        self.artifact = Some(artifact);
        self.sub_artifacts = sub_artifacts;
    }
}
