//! Thread-safe handle to a [`FeatureCache`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::cache::FeatureCache;
use crate::stats::CacheStats;

/// A cloneable, lock-protected cache shared between a document and readers.
///
/// Only one thread drives a rebuild pass at a time; the lock serializes it
/// against readers that inspect statistics or probe entries.
#[derive(Debug)]
pub struct SharedCache<V> {
    inner: Arc<Mutex<FeatureCache<V>>>,
}

impl<V> Clone for SharedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for SharedCache<V> {
    fn default() -> Self {
        Self::new(FeatureCache::new())
    }
}

impl<V> SharedCache<V> {
    /// Wraps an existing cache.
    pub fn new(cache: FeatureCache<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    /// Locks the cache.
    ///
    /// Every mutation is a single map operation, so a panic while the lock
    /// was held leaves the entries valid. A pass the panic interrupted is
    /// abandoned without sweeping, and the lock is usable again.
    pub fn lock(&self) -> MutexGuard<'_, FeatureCache<V>> {
        match self.inner.lock() {
            Ok(cache) => cache,
            Err(poisoned) => {
                let mut cache = poisoned.into_inner();
                if cache.abandon_rebuild().is_ok() {
                    warn!(
                        generation = cache.generation(),
                        "rebuild pass interrupted by a panic, abandoned"
                    );
                }
                self.inner.clear_poison();
                cache
            }
        }
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }
}
