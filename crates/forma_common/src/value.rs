//! Parameter values carried by feature nodes.

use crate::hash::{canonical_f64_bits, FingerprintHasher, StableHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point or direction in model space.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Creates a vector from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the components as an array.
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl StableHash for Vec3 {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_f64(self.x);
        hasher.write_f64(self.y);
        hasher.write_f64(self.z);
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// A resolved parameter value of a feature node.
///
/// Equality is by canonical value: `-0.0 == 0.0` and all NaNs are equal,
/// matching what the fingerprint sees.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    /// A real number.
    Scalar(f64),
    /// An integer count or index.
    Int(i64),
    /// A flag.
    Bool(bool),
    /// A string (names, file references, mode selectors).
    Str(String),
    /// A point or direction.
    Vector(Vec3),
    /// An ordered list of values.
    List(Vec<Value>),
}

impl Value {
    /// Returns a short name for the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Vector(_) => "vector",
            Value::List(_) => "list",
        }
    }

    /// Returns the value as a real number, widening integers.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the value as a vector.
    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let feq = |a: f64, b: f64| canonical_f64_bits(a) == canonical_f64_bits(b);
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => feq(*a, *b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => {
                feq(a.x, b.x) && feq(a.y, b.y) && feq(a.z, b.z)
            }
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl StableHash for Value {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        match self {
            Value::Scalar(v) => {
                hasher.write_tag(0);
                hasher.write_f64(*v);
            }
            Value::Int(v) => {
                hasher.write_tag(1);
                hasher.write_i64(*v);
            }
            Value::Bool(v) => {
                hasher.write_tag(2);
                hasher.write_bool(*v);
            }
            Value::Str(s) => {
                hasher.write_tag(3);
                hasher.write_str(s);
            }
            Value::Vector(v) => {
                hasher.write_tag(4);
                v.stable_hash(hasher);
            }
            Value::List(items) => {
                hasher.write_tag(5);
                items.as_slice().stable_hash(hasher);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Vector(v) => write!(f, "{v}"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Value::Vector(v)
    }
}
