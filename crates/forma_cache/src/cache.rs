//! Fingerprint-keyed store with generational mark-and-sweep eviction.
//!
//! A rebuild pass is bracketed by [`FeatureCache::init_rebuild`] and
//! [`FeatureCache::finish_rebuild`]. Opening a pass advances the generation,
//! which implicitly clears every entry's "used" mark; closing it evicts the
//! entries that were never marked during the pass. Nothing is evicted by age
//! or by size: a subtree left untouched by one edit but needed again by the
//! next survives exactly as long as some pass keeps reaching it.

use std::collections::HashMap;

use forma_common::{Fingerprint, Recipe};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::stats::CacheStats;

/// One cached build result.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    /// The key this entry is stored under.
    pub fingerprint: Fingerprint,
    /// The cached result.
    pub value: V,
    /// The byte stream the fingerprint was computed from, if recorded.
    pub recipe: Option<Recipe>,
    /// The last generation in which a lookup resolved to this entry.
    pub last_used_generation: u64,
}

/// Outcome of [`FeatureCache::lookup`].
#[derive(Debug)]
pub enum Lookup<'a, V> {
    /// A matching entry exists.
    Hit(&'a V),
    /// No entry is stored under the fingerprint.
    Miss,
    /// An entry is stored under the fingerprint but was computed from
    /// different inputs.
    Collision,
}

/// Generational cache of build results keyed by fingerprint.
///
/// Writers must be serialized: only the thread driving a rebuild pass may
/// call the mutating methods. Share it across threads through
/// [`SharedCache`](crate::shared::SharedCache).
#[derive(Debug)]
pub struct FeatureCache<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    generation: u64,
    rebuilding: bool,
    stats: CacheStats,
}

impl<V> Default for FeatureCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FeatureCache<V> {
    /// Creates an empty cache at generation 0.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            generation: 0,
            rebuilding: false,
            stats: CacheStats::default(),
        }
    }

    /// Returns the current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` between `init_rebuild` and `finish_rebuild`.
    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding
    }

    /// Returns `true` if an entry is stored under the fingerprint.
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.entries.contains_key(fp)
    }

    /// Returns the value stored under the fingerprint.
    pub fn get(&self, fp: &Fingerprint) -> Result<&V, CacheError> {
        self.entries
            .get(fp)
            .map(|e| &e.value)
            .ok_or(CacheError::Missing(*fp))
    }

    /// Returns the full entry stored under the fingerprint.
    pub fn entry(&self, fp: &Fingerprint) -> Option<&CacheEntry<V>> {
        self.entries.get(fp)
    }

    /// Looks up a fingerprint, verifying the recipe when both sides have one.
    ///
    /// Updates the hit/miss/collision counters. Does not mark the entry used.
    pub fn lookup(&mut self, fp: &Fingerprint, recipe: Option<&Recipe>) -> Lookup<'_, V> {
        match self.entries.get(fp) {
            None => {
                self.stats.misses += 1;
                Lookup::Miss
            }
            Some(entry) => match (&entry.recipe, recipe) {
                (Some(stored), Some(probe)) if stored != probe => {
                    self.stats.collisions += 1;
                    warn!(
                        fingerprint = %fp,
                        stored_len = stored.len(),
                        probe_len = probe.len(),
                        "fingerprint collision: recipes differ"
                    );
                    Lookup::Collision
                }
                _ => {
                    self.stats.hits += 1;
                    Lookup::Hit(&entry.value)
                }
            },
        }
    }

    /// Stores a value, replacing any previous entry under the fingerprint.
    ///
    /// The new entry counts as used in the current generation.
    pub fn put(&mut self, fp: Fingerprint, value: V, recipe: Option<Recipe>) {
        self.stats.insertions += 1;
        self.entries.insert(
            fp,
            CacheEntry {
                fingerprint: fp,
                value,
                recipe,
                last_used_generation: self.generation,
            },
        );
    }

    /// Marks an entry as reached in the current generation.
    pub fn mark_used(&mut self, fp: &Fingerprint) -> Result<(), CacheError> {
        let generation = self.generation;
        let entry = self.entries.get_mut(fp).ok_or(CacheError::Missing(*fp))?;
        entry.last_used_generation = generation;
        Ok(())
    }

    /// Returns `true` if the entry was marked in the current generation.
    pub fn is_used(&self, fp: &Fingerprint) -> bool {
        self.entries
            .get(fp)
            .is_some_and(|e| e.last_used_generation == self.generation)
    }

    /// Opens a rebuild pass. Entries are kept; only their marks are reset.
    pub fn init_rebuild(&mut self) -> Result<u64, CacheError> {
        if self.rebuilding {
            return Err(CacheError::RebuildInProgress(self.generation));
        }
        self.generation += 1;
        self.rebuilding = true;
        debug!(generation = self.generation, entries = self.entries.len(), "rebuild pass opened");
        Ok(self.generation)
    }

    /// Closes the pass and evicts every entry not marked during it.
    ///
    /// Returns the number of evicted entries.
    pub fn finish_rebuild(&mut self) -> Result<usize, CacheError> {
        if !self.rebuilding {
            return Err(CacheError::NotRebuilding);
        }
        self.rebuilding = false;
        let generation = self.generation;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.last_used_generation == generation);
        let evicted = before - self.entries.len();
        self.stats.evictions += evicted as u64;
        debug!(generation, evicted, kept = self.entries.len(), "rebuild pass swept");
        Ok(evicted)
    }

    /// Closes the pass without sweeping, keeping every entry.
    ///
    /// Used when a pass is cancelled or aborted: entries committed by nodes
    /// that did complete remain valid, and unreached ones get another chance.
    pub fn abandon_rebuild(&mut self) -> Result<(), CacheError> {
        if !self.rebuilding {
            return Err(CacheError::NotRebuilding);
        }
        self.rebuilding = false;
        debug!(generation = self.generation, "rebuild pass abandoned");
        Ok(())
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over the stored fingerprints in arbitrary order.
    pub fn fingerprints(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.keys()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            generation: self.generation,
            ..self.stats
        }
    }
}
