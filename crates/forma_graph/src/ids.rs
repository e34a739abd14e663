//! Opaque ID newtypes for graph entities.
//!
//! Each ID is a thin `u32` wrapper created by [`Arena::alloc`](crate::arena::Arena::alloc).
//! IDs are only meaningful inside the graph or query store that issued them:
//! a re-parsed script yields new ids, and cache entries are matched by
//! fingerprint rather than by id.

use crate::arena::ArenaId;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a feature node in a [`FeatureGraph`](crate::graph::FeatureGraph).
    NodeId,
    "#"
);

define_id!(
    /// Opaque, copyable ID for a registered deferred query.
    QueryId,
    "?"
);
