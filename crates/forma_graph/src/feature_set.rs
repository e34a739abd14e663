//! Concrete selections of sub-entities of one built node.

use crate::error::GraphError;
use crate::ids::NodeId;
use crate::topology::{EntityId, EntityKind};
use std::collections::BTreeSet;

/// A set of entities of one kind, all belonging to the same node's artifact.
///
/// Ids are kept sorted, so two sets with the same members compare equal
/// regardless of how they were assembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureSet {
    owner: NodeId,
    kind: EntityKind,
    ids: BTreeSet<EntityId>,
}

impl FeatureSet {
    /// Creates an empty set.
    pub fn new(owner: NodeId, kind: EntityKind) -> Self {
        Self {
            owner,
            kind,
            ids: BTreeSet::new(),
        }
    }

    /// Creates a set from the given ids.
    pub fn from_ids(owner: NodeId, kind: EntityKind, ids: impl IntoIterator<Item = EntityId>) -> Self {
        Self {
            owner,
            kind,
            ids: ids.into_iter().collect(),
        }
    }

    /// The node whose artifact the ids index into.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// The kind of entity selected.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Adds one id.
    pub fn insert(&mut self, id: EntityId) {
        self.ids.insert(id);
    }

    /// Merges another set into this one.
    ///
    /// Fails if the sets range over different nodes or entity kinds; their ids
    /// would not be comparable.
    pub fn union(&mut self, other: &FeatureSet) -> Result<(), GraphError> {
        if self.owner != other.owner || self.kind != other.kind {
            return Err(GraphError::SetMismatch {
                left: self.owner,
                left_kind: self.kind,
                right: other.owner,
                right_kind: other.kind,
            });
        }
        self.ids.extend(other.ids.iter().copied());
        Ok(())
    }

    /// Returns `true` if the id is selected.
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns the number of selected entities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates over the selected ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    /// Returns the only member, or `None` if the set is empty or ambiguous.
    pub fn single(&self) -> Option<EntityId> {
        if self.ids.len() == 1 {
            self.ids.iter().next().copied()
        } else {
            None
        }
    }
}
