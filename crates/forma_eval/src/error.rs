//! Evaluation errors.

use std::fmt;

use forma_cache::CacheError;
use forma_common::InternalError;
use forma_graph::{FeatureGraph, GraphError, NodeId};

/// A node as named in error messages.
///
/// Carries the label and type tag so an error can be reported after the
/// graph it came from has been replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureRef {
    /// The node id within the evaluated graph.
    pub id: NodeId,
    /// The script label, if any.
    pub label: Option<String>,
    /// The operation kind.
    pub type_tag: String,
}

impl FeatureRef {
    /// Captures a node of `graph`.
    pub fn of(graph: &FeatureGraph, id: NodeId) -> Self {
        let (label, type_tag) = match graph.node(id) {
            Ok(node) => (
                node.label().map(str::to_string),
                graph.type_name(id).unwrap_or_default().to_string(),
            ),
            Err(_) => (None, String::new()),
        };
        Self { id, label, type_tag }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label}"),
            None => write!(f, "{}{}", self.type_tag, self.id),
        }
    }
}

fn join(path: &[FeatureRef]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while evaluating a feature graph.
///
/// `within` lists the features whose evaluation was aborted by the error,
/// innermost first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// A parameter was rejected before `build()` ran.
    #[error("invalid parameter `{name}` of `{feature}`: {message}")]
    Parameter {
        /// The node whose parameter is invalid.
        feature: FeatureRef,
        /// The parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
        /// Aborted ancestors.
        within: Vec<FeatureRef>,
    },

    /// The geometry engine failed to build a node.
    #[error("failed to build `{feature}`: {message}")]
    Build {
        /// The node that failed.
        feature: FeatureRef,
        /// The engine's message.
        message: String,
        /// Aborted ancestors.
        within: Vec<FeatureRef>,
    },

    /// The graph contains a dependency cycle.
    #[error("dependency cycle: {}", join(.path))]
    Cycle {
        /// The cycle, starting and ending at the same node.
        path: Vec<FeatureRef>,
    },

    /// The pass was cancelled before reaching a node.
    #[error("rebuild cancelled before `{before}`")]
    Cancelled {
        /// The first node that was not evaluated.
        before: FeatureRef,
    },

    /// A graph lookup failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The cache protocol was violated.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An evaluator invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl EvalError {
    /// `true` for errors that abort the whole pass rather than one path.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EvalError::Parameter { .. } | EvalError::Build { .. })
    }

    /// The node the error originated at, if it concerns one.
    pub fn feature(&self) -> Option<&FeatureRef> {
        match self {
            EvalError::Parameter { feature, .. } | EvalError::Build { feature, .. } => Some(feature),
            EvalError::Cycle { path } => path.first(),
            EvalError::Cancelled { before } => Some(before),
            EvalError::Graph(_) | EvalError::Cache(_) | EvalError::Internal(_) => None,
        }
    }
}
