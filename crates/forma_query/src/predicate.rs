//! The predicate language.

use std::fmt;

/// Which end of a metric an [`Predicate::Extremal`] keeps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Extreme {
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
}

/// A filter over a candidate set of entities.
///
/// `%i` in the descriptions below is the `i`-th supporting argument of the
/// query being resolved.
#[derive(Clone, PartialEq, Debug)]
pub enum Predicate {
    /// Keeps every candidate.
    Everything,
    /// Keeps candidates whose geometric signature equals that of some
    /// entity of `%i`.
    IdenticalTo(usize),
    /// Keeps candidates whose bounds lie within `%i` (within tolerance).
    ContainedIn(usize),
    /// Keeps candidates that are members of the selection `%i`.
    MemberOf(usize),
    /// Keeps the candidates at the minimum or maximum of a named metric.
    Extremal {
        /// Metric name, e.g. `area`, `length`, `cz`.
        metric: String,
        /// Which end to keep.
        extreme: Extreme,
    },
    /// Expands a rule from the [`RuleBook`](crate::rules::RuleBook).
    Named(String),
    /// Keeps the candidates the operand rejects.
    Not(Box<Predicate>),
    /// Applies every operand in turn, each to the survivors of the last.
    And(Vec<Predicate>),
    /// Keeps candidates accepted by any operand.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Shorthand for [`Predicate::Extremal`] with [`Extreme::Max`].
    pub fn max(metric: impl Into<String>) -> Self {
        Predicate::Extremal {
            metric: metric.into(),
            extreme: Extreme::Max,
        }
    }

    /// Shorthand for [`Predicate::Extremal`] with [`Extreme::Min`].
    pub fn min(metric: impl Into<String>) -> Self {
        Predicate::Extremal {
            metric: metric.into(),
            extreme: Extreme::Min,
        }
    }

    /// Shorthand for [`Predicate::Named`].
    pub fn named(rule: impl Into<String>) -> Self {
        Predicate::Named(rule.into())
    }

    /// Negates `self`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Conjoins `self` with `other`, flattening nested conjunctions.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut ps) => {
                ps.push(other);
                Predicate::And(ps)
            }
            p => Predicate::And(vec![p, other]),
        }
    }

    /// Disjoins `self` with `other`, flattening nested disjunctions.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut ps) => {
                ps.push(other);
                Predicate::Or(ps)
            }
            p => Predicate::Or(vec![p, other]),
        }
    }

    /// The highest argument index referenced directly (not through rules).
    pub fn max_arg(&self) -> Option<usize> {
        match self {
            Predicate::IdenticalTo(i) | Predicate::ContainedIn(i) | Predicate::MemberOf(i) => {
                Some(*i)
            }
            Predicate::Everything | Predicate::Extremal { .. } | Predicate::Named(_) => None,
            Predicate::Not(p) => p.max_arg(),
            Predicate::And(ps) | Predicate::Or(ps) => ps.iter().filter_map(Predicate::max_arg).max(),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, ps: &[Predicate]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, p) in ps.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{p}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Everything => write!(f, "all"),
            Predicate::IdenticalTo(i) => write!(f, "identical(%{i})"),
            Predicate::ContainedIn(i) => write!(f, "inside(%{i})"),
            Predicate::MemberOf(i) => write!(f, "in(%{i})"),
            Predicate::Extremal { metric, extreme } => match extreme {
                Extreme::Min => write!(f, "minimal({metric})"),
                Extreme::Max => write!(f, "maximal({metric})"),
            },
            Predicate::Named(rule) => write!(f, "@{rule}"),
            Predicate::Not(p) => write!(f, "not({p})"),
            Predicate::And(ps) => write_list(f, "and", ps),
            Predicate::Or(ps) => write_list(f, "or", ps),
        }
    }
}
