//! Shared foundational types used across the Forma feature-evaluation engine.
//!
//! This crate provides structural fingerprints and their hasher, canonical
//! parameter values, interned identifiers for node type tags, and the
//! internal-error type used for evaluator invariant violations.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;
pub mod value;

pub use hash::{Fingerprint, FingerprintHasher, Recipe, StableHash};
pub use ident::{TypeTag, TypeTags};
pub use result::{FormaResult, InternalError};
pub use value::{Value, Vec3};
