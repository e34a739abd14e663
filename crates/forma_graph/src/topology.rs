//! Kernel-independent description of a built shape's sub-entities.
//!
//! The geometry engine reports every vertex, edge, face and solid of an
//! artifact as an [`Entity`] record: a geometric signature, a bounding box,
//! and named scalar metrics. Structural queries run against these records
//! only, so they can be tested without a geometry kernel.

use forma_common::{Fingerprint, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of sub-entity a feature set or query ranges over.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum EntityKind {
    /// Topological vertices.
    Vertex,
    /// Topological edges.
    Edge,
    /// Topological faces.
    Face,
    /// Solids.
    Solid,
}

impl EntityKind {
    /// All kinds, in topological order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Vertex,
        EntityKind::Edge,
        EntityKind::Face,
        EntityKind::Solid,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Vertex => write!(f, "vertex"),
            EntityKind::Edge => write!(f, "edge"),
            EntityKind::Face => write!(f, "face"),
            EntityKind::Solid => write!(f, "solid"),
        }
    }
}

/// A 1-based index of an entity within one kind of a [`Topology`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an entity id from its 1-based number.
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    /// Returns the 1-based number.
    pub fn get(self) -> u32 {
        self.0
    }

    fn slot(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two opposite corners, in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Creates a degenerate box around a single point.
    pub fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    /// Returns the smallest box enclosing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(
            Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        )
    }

    /// Returns `true` if `other` lies inside this box, widened by `tolerance`.
    pub fn contains(&self, other: &Aabb, tolerance: f64) -> bool {
        let lo = self.min.to_array();
        let hi = self.max.to_array();
        let olo = other.min.to_array();
        let ohi = other.max.to_array();
        (0..3).all(|i| olo[i] >= lo[i] - tolerance && ohi[i] <= hi[i] + tolerance)
    }
}

/// One vertex, edge, face or solid of a built shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    /// Geometric identity: equal signatures mean the same underlying geometry,
    /// even across different artifacts.
    pub signature: Fingerprint,
    /// Bounding box of the entity.
    pub bounds: Aabb,
    /// Named scalar measures (`area`, `length`, `volume`, `cx`, ...).
    pub metrics: BTreeMap<String, f64>,
}

impl Entity {
    /// Creates an entity record without metrics.
    pub fn new(signature: Fingerprint, bounds: Aabb) -> Self {
        Self {
            signature,
            bounds,
            metrics: BTreeMap::new(),
        }
    }

    /// Adds a named metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Returns a named metric.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// The finalized sub-entity table of an artifact.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Topology {
    vertices: Vec<Entity>,
    edges: Vec<Entity>,
    faces: Vec<Entity>,
    solids: Vec<Entity>,
}

impl Topology {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entity and returns its 1-based id.
    pub fn push(&mut self, kind: EntityKind, entity: Entity) -> EntityId {
        let list = self.list_mut(kind);
        list.push(entity);
        EntityId(list.len() as u32)
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, kind: EntityKind, entity: Entity) -> Self {
        self.push(kind, entity);
        self
    }

    /// Returns all entities of one kind.
    pub fn entities(&self, kind: EntityKind) -> &[Entity] {
        match kind {
            EntityKind::Vertex => &self.vertices,
            EntityKind::Edge => &self.edges,
            EntityKind::Face => &self.faces,
            EntityKind::Solid => &self.solids,
        }
    }

    /// Returns one entity, or `None` if the id is out of range.
    pub fn get(&self, kind: EntityKind, id: EntityId) -> Option<&Entity> {
        id.slot().and_then(|i| self.entities(kind).get(i))
    }

    /// Returns the number of entities of one kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities(kind).len()
    }

    /// Iterates over all ids of one kind.
    pub fn ids(&self, kind: EntityKind) -> impl Iterator<Item = EntityId> {
        (1..=self.count(kind) as u32).map(EntityId)
    }

    /// Returns the box enclosing every entity, or `None` for an empty table.
    pub fn bounds(&self) -> Option<Aabb> {
        EntityKind::ALL
            .iter()
            .flat_map(|k| self.entities(*k))
            .map(|e| e.bounds)
            .reduce(|acc, b| acc.union(&b))
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<Entity> {
        match kind {
            EntityKind::Vertex => &mut self.vertices,
            EntityKind::Edge => &mut self.edges,
            EntityKind::Face => &mut self.faces,
            EntityKind::Solid => &mut self.solids,
        }
    }
}
