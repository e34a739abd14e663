//! Cumulative cache counters.

use std::fmt;

/// A snapshot of cache counters.
///
/// `entries` and `generation` describe the current state; every other field
/// counts events since the cache was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries.
    pub entries: usize,
    /// Current generation number.
    pub generation: u64,
    /// Lookups that found a matching entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Lookups whose fingerprint matched but whose recipe did not.
    pub collisions: u64,
    /// Entries stored.
    pub insertions: u64,
    /// Entries removed by sweeps.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.collisions;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries (gen {}), {} hits, {} misses, {} evicted",
            self.entries, self.generation, self.hits, self.misses, self.evictions
        )
    }
}
