//! Generational feature cache.
//!
//! This crate maps structural [`Fingerprint`](forma_common::Fingerprint)s to
//! build results and evicts with mark-and-sweep: an entry survives a rebuild
//! pass only if some node resolved to its fingerprint during that pass. The
//! cache is in-memory and scoped to one open document.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod shared;
pub mod stats;

pub use cache::{CacheEntry, FeatureCache, Lookup};
pub use error::CacheError;
pub use shared::SharedCache;
pub use stats::CacheStats;
