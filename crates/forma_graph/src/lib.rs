//! The feature graph: an arena of declarative CAD feature nodes.
//!
//! A script compiles to a [`FeatureGraph`] whose [`FeatureNode`]s name an
//! operation ([`type_tag`](FeatureNode::type_tag)), carry ordered parameters
//! and dependencies, and, once evaluated, hold an [`Artifact`] plus named
//! [`SubArtifact`]s. Nodes are addressed by [`NodeId`] so that a node shared
//! by several parents is stored, built and fingerprinted once.

#![warn(missing_docs)]

pub mod arena;
pub mod artifact;
pub mod error;
pub mod feature_set;
pub mod graph;
pub mod ids;
pub mod node;
pub mod topology;

pub use arena::{Arena, ArenaId};
pub use artifact::Artifact;
pub use error::GraphError;
pub use feature_set::FeatureSet;
pub use graph::{FeatureGraph, NodeSpec};
pub use ids::{NodeId, QueryId};
pub use node::{BuildState, FeatureNode, NodeRef, Param, SubArtifact};
pub use topology::{Aabb, Entity, EntityId, EntityKind, Topology};
