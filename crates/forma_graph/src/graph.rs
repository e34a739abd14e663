//! The node arena produced by compiling a script.

use crate::arena::Arena;
use crate::artifact::Artifact;
use crate::error::GraphError;
use crate::ids::NodeId;
use crate::node::{BuildState, FeatureNode, NodeRef, Param, SubArtifact};
use forma_common::{TypeTags, Value};

/// Declarative description of a node, consumed by [`FeatureGraph::add_node`].
#[derive(Clone, Debug)]
pub struct NodeSpec {
    type_tag: String,
    label: Option<String>,
    params: Vec<Param>,
    deps: Vec<NodeId>,
}

impl NodeSpec {
    /// Starts a node of the given operation kind.
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            label: None,
            params: Vec::new(),
            deps: Vec::new(),
        }
    }

    /// Binds the node to a script symbol.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Appends a named parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Appends a dependency.
    pub fn input(mut self, dep: NodeId) -> Self {
        self.deps.push(dep);
        self
    }
}

/// A compiled feature graph.
///
/// Nodes are stored once and shared by id; a node referenced by several
/// parents is a single arena entry. The graph is mutated by the evaluator
/// (state transitions, leaf demotion) and by in-place parameter edits.
pub struct FeatureGraph {
    nodes: Arena<NodeId, FeatureNode>,
    tags: TypeTags,
}

impl FeatureGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            tags: TypeTags::default(),
        }
    }

    /// Adds a node. Every dependency must already be part of this graph.
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId, GraphError> {
        if let Some(bad) = spec.deps.iter().find(|d| !self.nodes.contains(**d)) {
            return Err(GraphError::UnknownNode(*bad));
        }
        let tag = self.tags.intern(&spec.type_tag);
        Ok(self
            .nodes
            .alloc(FeatureNode::new(tag, spec.label, spec.params, spec.deps)))
    }

    /// Appends a dependency to an existing node.
    ///
    /// This is how forward references of a script are wired up; unlike
    /// [`add_node`](Self::add_node) it can close a cycle, which the evaluator
    /// reports.
    pub fn add_dependency(&mut self, node: NodeId, dep: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains(dep) {
            return Err(GraphError::UnknownNode(dep));
        }
        let n = self.node_mut(node)?;
        n.deps.push(dep);
        n.invalidate();
        Ok(())
    }

    /// Returns a node.
    pub fn node(&self, id: NodeId) -> Result<&FeatureNode, GraphError> {
        self.nodes.get(id).ok_or(GraphError::UnknownNode(id))
    }

    /// Returns a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut FeatureNode, GraphError> {
        self.nodes.get_mut(id).ok_or(GraphError::UnknownNode(id))
    }

    /// Returns the operation kind of a node as a string.
    pub fn type_name(&self, id: NodeId) -> Result<&str, GraphError> {
        let tag = self.node(id)?.type_tag;
        self.tags.name(tag).ok_or(GraphError::UnknownNode(id))
    }

    /// Returns the name used for a node in messages: its label, or its type
    /// and id when unlabelled.
    pub fn display_name(&self, id: NodeId) -> String {
        match self.nodes.get(id) {
            Some(n) => match &n.label {
                Some(label) => label.clone(),
                None => format!("{}{}", self.tags.name(n.type_tag).unwrap_or_default(), id),
            },
            None => id.to_string(),
        }
    }

    /// Records that a node consumes `child` as an input.
    ///
    /// Unconditionally demotes `child` from leaf status, however many
    /// parents reference it.
    pub fn use_node(&mut self, child: NodeId) -> Result<(), GraphError> {
        self.node_mut(child)?.is_leaf = false;
        Ok(())
    }

    /// Edits a parameter in place and returns the node to `Unbuilt`.
    ///
    /// Ancestors keep their state; the next evaluation pass re-fingerprints
    /// them and notices the change.
    pub fn set_param(&mut self, id: NodeId, name: &str, value: impl Into<Value>) -> Result<(), GraphError> {
        let display = self.display_name(id);
        let node = self.node_mut(id)?;
        let param = node
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or(GraphError::UnknownParameter {
                node: display,
                name: name.to_string(),
            })?;
        param.value = value.into();
        node.invalidate();
        Ok(())
    }

    /// Resolves a build-relative reference against a node's dependencies.
    pub fn resolve_ref(&self, owner: NodeId, r: NodeRef) -> Result<NodeId, GraphError> {
        match r {
            NodeRef::Owner => {
                self.node(owner)?;
                Ok(owner)
            }
            NodeRef::Input(index) => {
                let deps = &self.node(owner)?.deps;
                deps.get(index)
                    .copied()
                    .ok_or_else(|| GraphError::InputOutOfRange {
                        node: self.display_name(owner),
                        index,
                        len: deps.len(),
                    })
            }
        }
    }

    /// Returns the artifact of a built node.
    pub fn artifact(&self, id: NodeId) -> Result<&Artifact, GraphError> {
        let node = self.node(id)?;
        match (node.state(), node.artifact()) {
            (BuildState::Built, Some(a)) => Ok(a),
            (state, _) => Err(GraphError::NotBuilt {
                node: self.display_name(id),
                state,
            }),
        }
    }

    /// Returns a named sub-artifact of a built node.
    pub fn sub_artifact(&self, id: NodeId, name: &str) -> Result<&SubArtifact, GraphError> {
        self.artifact(id)?;
        self.node(id)?
            .sub_artifacts()
            .get(name)
            .ok_or_else(|| GraphError::UnknownSubArtifact {
                node: self.display_name(id),
                name: name.to_string(),
            })
    }

    /// Returns every node not consumed as an input by another node.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.is_leaf)
            .map(|(id, _)| id)
            .collect()
    }

    /// Iterates over all node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.ids()
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for FeatureGraph {
    fn default() -> Self {
        Self::new()
    }
}
