//! Error types for cache operations.

use forma_common::Fingerprint;

/// Errors raised by [`FeatureCache`](crate::cache::FeatureCache).
///
/// Each variant is a misuse of the cache protocol by its driver; none of
/// them can be caused by the contents of a script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// `get` or `mark_used` was called for a fingerprint that is not cached.
    #[error("no cache entry for fingerprint {0}")]
    Missing(Fingerprint),

    /// `init_rebuild` was called while a pass was already open.
    #[error("rebuild pass {0} is still open")]
    RebuildInProgress(u64),

    /// `finish_rebuild` or `abandon_rebuild` was called without an open pass.
    #[error("no rebuild pass is open")]
    NotRebuilding,
}
