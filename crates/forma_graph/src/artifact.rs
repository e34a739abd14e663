//! Opaque build results handed back by the geometry engine.

use crate::topology::{EntityKind, Topology};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The immutable result of building one feature node.
///
/// The engine's own shape value is stored type-erased and is only ever read
/// back by the engine (via [`shape`](Self::shape)). The evaluator and the
/// query layer see the artifact through its [`Topology`]. Cloning is cheap
/// and shares the underlying data, so a cache hit hands out the very same
/// artifact that was built.
#[derive(Clone)]
pub struct Artifact {
    shape: Arc<dyn Any + Send + Sync>,
    topology: Arc<Topology>,
}

impl Artifact {
    /// Wraps an engine shape and its sub-entity table.
    pub fn new<T: Any + Send + Sync>(shape: T, topology: Topology) -> Self {
        Self {
            shape: Arc::new(shape),
            topology: Arc::new(topology),
        }
    }

    /// Downcasts the engine shape, returning `None` for a different engine type.
    pub fn shape<T: Any>(&self) -> Option<&T> {
        self.shape.downcast_ref::<T>()
    }

    /// Returns the finalized sub-entity table.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns `true` if both handles share the same underlying shape.
    pub fn ptr_eq(&self, other: &Artifact) -> bool {
        Arc::ptr_eq(&self.shape, &other.shape)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.topology;
        write!(
            f,
            "Artifact {{ vertices: {}, edges: {}, faces: {}, solids: {} }}",
            t.count(EntityKind::Vertex),
            t.count(EntityKind::Edge),
            t.count(EntityKind::Face),
            t.count(EntityKind::Solid),
        )
    }
}
