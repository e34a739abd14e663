//! Predicate evaluation over a topology table.

use std::collections::BTreeSet;

use forma_common::Fingerprint;
use forma_graph::{Aabb, Entity, EntityId, EntityKind, FeatureSet, NodeId, Topology};

use crate::error::QueryError;
use crate::predicate::{Extreme, Predicate};
use crate::rules::RuleBook;

/// A supporting argument with its topology attached.
#[derive(Clone, Copy, Debug)]
pub enum BoundArg<'a> {
    /// A whole feature.
    Node(&'a Topology),
    /// A selection, with the topology of its owner.
    Set {
        /// Topology of `set.owner()`.
        topology: &'a Topology,
        /// The selection.
        set: &'a FeatureSet,
    },
}

impl<'a> BoundArg<'a> {
    fn members(&self, kind: EntityKind) -> Vec<&'a Entity> {
        match *self {
            BoundArg::Node(topology) => topology.entities(kind).iter().collect(),
            BoundArg::Set { topology, set } => set
                .iter()
                .filter_map(|id| topology.get(set.kind(), id))
                .collect(),
        }
    }
}

/// Filters entities of one kind of one feature.
#[derive(Clone, Copy, Debug)]
pub struct Filter<'a> {
    /// The feature whose entities are filtered.
    pub owner: NodeId,
    /// The entity kind being selected.
    pub kind: EntityKind,
    /// The owner's topology.
    pub topology: &'a Topology,
    /// Supporting arguments, indexed by `%i`.
    pub args: &'a [BoundArg<'a>],
    /// Definitions for named predicates.
    pub rules: &'a RuleBook,
    /// Geometric tolerance.
    pub tolerance: f64,
    /// Maximum nesting of named rules.
    pub max_rule_depth: u32,
}

impl<'a> Filter<'a> {
    /// Every entity of the selected kind.
    pub fn all(&self) -> BTreeSet<EntityId> {
        self.topology.ids(self.kind).collect()
    }

    /// Applies a predicate to a candidate set.
    pub fn apply(
        &self,
        predicate: &Predicate,
        candidates: &BTreeSet<EntityId>,
    ) -> Result<BTreeSet<EntityId>, QueryError> {
        self.apply_at(predicate, candidates, 0)
    }

    fn apply_at(
        &self,
        predicate: &Predicate,
        candidates: &BTreeSet<EntityId>,
        depth: u32,
    ) -> Result<BTreeSet<EntityId>, QueryError> {
        match predicate {
            Predicate::Everything => Ok(candidates.clone()),
            Predicate::IdenticalTo(i) => {
                let signatures: BTreeSet<Fingerprint> = self
                    .arg(*i)?
                    .members(self.kind)
                    .into_iter()
                    .map(|e| e.signature)
                    .collect();
                Ok(self.keep(candidates, |e| signatures.contains(&e.signature)))
            }
            Predicate::ContainedIn(i) => {
                let regions = self.regions(*i)?;
                Ok(self.keep(candidates, |e| {
                    regions.iter().any(|r| r.contains(&e.bounds, self.tolerance))
                }))
            }
            Predicate::MemberOf(i) => {
                let set = self.selection(*i)?;
                Ok(candidates.iter().copied().filter(|id| set.contains(*id)).collect())
            }
            Predicate::Extremal { metric, extreme } => self.extremal(candidates, metric, *extreme),
            Predicate::Named(rule) => {
                if depth >= self.max_rule_depth {
                    return Err(QueryError::RuleDepth {
                        rule: rule.clone(),
                        limit: self.max_rule_depth,
                    });
                }
                let body = self
                    .rules
                    .get(rule)
                    .ok_or_else(|| QueryError::UnknownRule(rule.clone()))?;
                self.apply_at(body, candidates, depth + 1)
            }
            Predicate::Not(inner) => {
                let rejected = self.apply_at(inner, candidates, depth)?;
                Ok(candidates.difference(&rejected).copied().collect())
            }
            Predicate::And(operands) => {
                let mut current = candidates.clone();
                for p in operands {
                    if current.is_empty() {
                        break;
                    }
                    current = self.apply_at(p, &current, depth)?;
                }
                Ok(current)
            }
            Predicate::Or(operands) => {
                let mut union = BTreeSet::new();
                for p in operands {
                    union.extend(self.apply_at(p, candidates, depth)?);
                }
                Ok(union)
            }
        }
    }

    fn arg(&self, index: usize) -> Result<&BoundArg<'a>, QueryError> {
        self.args.get(index).ok_or(QueryError::ArgIndex {
            index,
            len: self.args.len(),
        })
    }

    fn keep(
        &self,
        candidates: &BTreeSet<EntityId>,
        pred: impl Fn(&Entity) -> bool,
    ) -> BTreeSet<EntityId> {
        candidates
            .iter()
            .copied()
            .filter(|id| self.topology.get(self.kind, *id).is_some_and(&pred))
            .collect()
    }

    /// Regions for containment: a whole feature contributes its overall
    /// bounds, a selection contributes each member's bounds.
    fn regions(&self, index: usize) -> Result<Vec<Aabb>, QueryError> {
        Ok(match *self.arg(index)? {
            BoundArg::Node(topology) => topology.bounds().into_iter().collect(),
            BoundArg::Set { topology, set } => set
                .iter()
                .filter_map(|id| topology.get(set.kind(), id))
                .map(|e| e.bounds)
                .collect(),
        })
    }

    fn selection(&self, index: usize) -> Result<&'a FeatureSet, QueryError> {
        match *self.arg(index)? {
            BoundArg::Node(_) => Err(QueryError::ArgMismatch {
                index,
                reason: "is a whole feature, not a selection".to_string(),
            }),
            BoundArg::Set { set, .. } if set.owner() != self.owner || set.kind() != self.kind => {
                Err(QueryError::ArgMismatch {
                    index,
                    reason: format!(
                        "selects {} of {}, not {} of {}",
                        set.kind(),
                        set.owner(),
                        self.kind,
                        self.owner
                    ),
                })
            }
            BoundArg::Set { set, .. } => Ok(set),
        }
    }

    fn extremal(
        &self,
        candidates: &BTreeSet<EntityId>,
        metric: &str,
        extreme: Extreme,
    ) -> Result<BTreeSet<EntityId>, QueryError> {
        let mut values = Vec::with_capacity(candidates.len());
        for &id in candidates {
            let Some(entity) = self.topology.get(self.kind, id) else {
                continue;
            };
            let value = entity.metric(metric).ok_or_else(|| QueryError::UnknownMetric {
                metric: metric.to_string(),
                kind: self.kind,
                entity: id,
            })?;
            values.push((id, value));
        }
        let target = values
            .iter()
            .map(|(_, v)| *v)
            .reduce(|a, b| match extreme {
                Extreme::Min => a.min(b),
                Extreme::Max => a.max(b),
            });
        let Some(target) = target else {
            return Ok(BTreeSet::new());
        };
        Ok(values
            .into_iter()
            .filter(|(_, v)| (v - target).abs() <= self.tolerance)
            .map(|(id, _)| id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forma_common::Vec3;

    const TOL: f64 = 1e-7;

    fn face(sig: &str, min: [f64; 3], max: [f64; 3], area: f64) -> Entity {
        Entity::new(
            Fingerprint::from_bytes(sig.as_bytes()),
            Aabb::new(Vec3::new(min[0], min[1], min[2]), Vec3::new(max[0], max[1], max[2])),
        )
        .with_metric("area", area)
        .with_metric("cz", (min[2] + max[2]) / 2.0)
    }

    /// Unit cube at the origin: bottom, top and one side face.
    fn cube() -> Topology {
        Topology::new()
            .with(EntityKind::Face, face("bottom", [0.0, 0.0, 0.0], [1.0, 1.0, 0.0], 1.0))
            .with(EntityKind::Face, face("top", [0.0, 0.0, 1.0], [1.0, 1.0, 1.0], 1.0))
            .with(EntityKind::Face, face("side", [0.0, 0.0, 0.0], [1.0, 0.0, 1.0], 1.0))
    }

    /// A plate whose top face coincides with the cube's bottom face.
    fn plate() -> Topology {
        Topology::new()
            .with(EntityKind::Face, face("bottom", [0.0, 0.0, 0.0], [1.0, 1.0, 0.0], 1.0))
            .with(EntityKind::Face, face("big", [-1.0, -1.0, -1.0], [2.0, 2.0, -1.0], 9.0))
    }

    fn ids(ns: &[u32]) -> BTreeSet<EntityId> {
        ns.iter().map(|n| EntityId::new(*n)).collect()
    }

    fn filter<'a>(topology: &'a Topology, args: &'a [BoundArg<'a>], rules: &'a RuleBook) -> Filter<'a> {
        Filter {
            owner: NodeId::from_raw(0),
            kind: EntityKind::Face,
            topology,
            args,
            rules,
            tolerance: TOL,
            max_rule_depth: 4,
        }
    }

    #[test]
    fn everything_keeps_candidates() {
        let topo = cube();
        let rules = RuleBook::new();
        let f = filter(&topo, &[], &rules);
        assert_eq!(f.apply(&Predicate::Everything, &f.all()).unwrap(), ids(&[1, 2, 3]));
    }

    #[test]
    fn identical_to_whole_node() {
        let topo = cube();
        let other = plate();
        let rules = RuleBook::new();
        let args = [BoundArg::Node(&other)];
        let f = filter(&topo, &args, &rules);
        assert_eq!(f.apply(&Predicate::IdenticalTo(0), &f.all()).unwrap(), ids(&[1]));
    }

    #[test]
    fn identical_to_selection() {
        let topo = cube();
        let other = cube();
        let rules = RuleBook::new();
        let set = FeatureSet::from_ids(NodeId::from_raw(5), EntityKind::Face, ids(&[2]));
        let args = [BoundArg::Set {
            topology: &other,
            set: &set,
        }];
        let f = filter(&topo, &args, &rules);
        assert_eq!(f.apply(&Predicate::IdenticalTo(0), &f.all()).unwrap(), ids(&[2]));
    }

    #[test]
    fn contained_in_uses_tolerance() {
        let topo = cube();
        let region = Topology::new().with(
            EntityKind::Solid,
            face("box", [0.0, 0.0, -1e-9], [1.0, 1.0, 0.5], 0.0),
        );
        let rules = RuleBook::new();
        let args = [BoundArg::Node(&region)];
        let f = filter(&topo, &args, &rules);
        assert_eq!(f.apply(&Predicate::ContainedIn(0), &f.all()).unwrap(), ids(&[1]));
    }

    #[test]
    fn member_of_requires_matching_selection() {
        let topo = cube();
        let rules = RuleBook::new();
        let own = FeatureSet::from_ids(NodeId::from_raw(0), EntityKind::Face, ids(&[2, 3]));
        let foreign = FeatureSet::from_ids(NodeId::from_raw(1), EntityKind::Face, ids(&[2]));
        let args = [
            BoundArg::Set {
                topology: &topo,
                set: &own,
            },
            BoundArg::Set {
                topology: &topo,
                set: &foreign,
            },
            BoundArg::Node(&topo),
        ];
        let f = filter(&topo, &args, &rules);
        assert_eq!(f.apply(&Predicate::MemberOf(0), &f.all()).unwrap(), ids(&[2, 3]));
        assert!(matches!(
            f.apply(&Predicate::MemberOf(1), &f.all()),
            Err(QueryError::ArgMismatch { index: 1, .. })
        ));
        assert!(matches!(
            f.apply(&Predicate::MemberOf(2), &f.all()),
            Err(QueryError::ArgMismatch { index: 2, .. })
        ));
    }

    #[test]
    fn extremal_keeps_ties() {
        let topo = cube();
        let rules = RuleBook::new();
        let f = filter(&topo, &[], &rules);
        assert_eq!(f.apply(&Predicate::max("cz"), &f.all()).unwrap(), ids(&[2]));
        assert_eq!(f.apply(&Predicate::min("cz"), &f.all()).unwrap(), ids(&[1]));
        assert_eq!(f.apply(&Predicate::max("area"), &f.all()).unwrap(), ids(&[1, 2, 3]));
        assert!(f.apply(&Predicate::max("cz"), &BTreeSet::new()).unwrap().is_empty());
    }

    #[test]
    fn extremal_unknown_metric() {
        let topo = cube();
        let rules = RuleBook::new();
        let f = filter(&topo, &[], &rules);
        assert!(matches!(
            f.apply(&Predicate::max("volume"), &f.all()),
            Err(QueryError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn combinators() {
        let topo = cube();
        let rules = RuleBook::new();
        let f = filter(&topo, &[], &rules);
        let not_top = Predicate::max("cz").not();
        assert_eq!(f.apply(&not_top, &f.all()).unwrap(), ids(&[1, 3]));
        // `and` narrows in sequence: the side face is the highest of the rest.
        let p = Predicate::max("cz").not().and(Predicate::max("cz"));
        assert_eq!(f.apply(&p, &f.all()).unwrap(), ids(&[3]));
        let p = Predicate::max("cz").or(Predicate::min("cz"));
        assert_eq!(f.apply(&p, &f.all()).unwrap(), ids(&[1, 2]));
    }

    #[test]
    fn named_rules_expand() {
        let topo = cube();
        let rules = RuleBook::new()
            .with("top", Predicate::max("cz"))
            .with("not_top", Predicate::named("top").not());
        let f = filter(&topo, &[], &rules);
        assert_eq!(f.apply(&Predicate::named("not_top"), &f.all()).unwrap(), ids(&[1, 3]));
        assert_eq!(
            f.apply(&Predicate::named("missing"), &f.all()),
            Err(QueryError::UnknownRule("missing".to_string()))
        );
    }

    #[test]
    fn recursive_rule_hits_depth_limit() {
        let topo = cube();
        let rules = RuleBook::new().with("loop", Predicate::named("loop"));
        let f = filter(&topo, &[], &rules);
        assert_eq!(
            f.apply(&Predicate::named("loop"), &f.all()),
            Err(QueryError::RuleDepth {
                rule: "loop".to_string(),
                limit: 4
            })
        );
    }

    #[test]
    fn missing_argument() {
        let topo = cube();
        let rules = RuleBook::new();
        let f = filter(&topo, &[], &rules);
        assert_eq!(
            f.apply(&Predicate::IdenticalTo(1), &f.all()),
            Err(QueryError::ArgIndex { index: 1, len: 0 })
        );
    }
}
