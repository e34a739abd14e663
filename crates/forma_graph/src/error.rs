//! Error types for graph construction and post-evaluation access.

use crate::ids::NodeId;
use crate::node::BuildState;
use crate::topology::EntityKind;

/// Errors raised by [`FeatureGraph`](crate::graph::FeatureGraph) accessors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// The id was not issued by this graph.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// An artifact or sub-artifact was requested before the node was built.
    #[error("feature `{node}` is not built (state: {state})")]
    NotBuilt {
        /// Display name of the node.
        node: String,
        /// The node's current state.
        state: BuildState,
    },

    /// No sub-artifact with this name was produced by the node's build.
    #[error("feature `{node}` provides no sub-artifact named `{name}`")]
    UnknownSubArtifact {
        /// Display name of the node.
        node: String,
        /// The requested name.
        name: String,
    },

    /// No parameter with this name is declared on the node.
    #[error("feature `{node}` has no parameter `{name}`")]
    UnknownParameter {
        /// Display name of the node.
        node: String,
        /// The requested name.
        name: String,
    },

    /// A relative input reference points past the node's dependency list.
    #[error("feature `{node}` has {len} inputs, input {index} requested")]
    InputOutOfRange {
        /// Display name of the node.
        node: String,
        /// The requested input position.
        index: usize,
        /// The number of dependencies.
        len: usize,
    },

    /// Two feature sets over different nodes or entity kinds were combined.
    #[error("cannot combine a {left_kind} set of {left} with a {right_kind} set of {right}")]
    SetMismatch {
        /// Owner of the receiving set.
        left: NodeId,
        /// Entity kind of the receiving set.
        left_kind: EntityKind,
        /// Owner of the other set.
        right: NodeId,
        /// Entity kind of the other set.
        right_kind: EntityKind,
    },
}
