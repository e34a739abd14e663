//! Structural fingerprints for feature-node identity and cache lookup.
//!
//! A [`Fingerprint`] is the 128-bit XXH3 digest of a canonical byte stream.
//! The stream is produced by a [`FingerprintHasher`], which prefixes every
//! combined item with a kind byte and every variable-length item with its
//! length, so the order and grouping of inputs is part of the identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit structural fingerprint computed using XXH3.
///
/// Two feature nodes with equal fingerprints are assumed to produce the same
/// artifact. Equality and ordering are total, so fingerprints can key both
/// hash maps and ordered maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Computes a fingerprint directly from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// The exact byte stream a fingerprint was computed from.
///
/// Recorded on request so that two inputs hashing to the same fingerprint can
/// be told apart by full comparison.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Recipe(Vec<u8>);

impl Recipe {
    /// Returns the recorded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the number of recorded bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Kind bytes written ahead of every combined item.
const TAG_STR: u8 = 0x01;
const TAG_F64: u8 = 0x02;
const TAG_I64: u8 = 0x03;
const TAG_BOOL: u8 = 0x04;
const TAG_FINGERPRINT: u8 = 0x05;
const TAG_SEQ: u8 = 0x06;
const TAG_U8: u8 = 0x07;

/// Incremental builder for a [`Fingerprint`].
///
/// Items are combined in order; combining the same sequence always yields the
/// same fingerprint, and reordering the sequence changes it.
pub struct FingerprintHasher {
    state: Xxh3,
    recipe: Option<Vec<u8>>,
}

impl FingerprintHasher {
    /// Creates a hasher with an empty input sequence.
    pub fn new() -> Self {
        Self {
            state: Xxh3::new(),
            recipe: None,
        }
    }

    /// Creates a hasher that also keeps a copy of every byte it digests.
    pub fn recording() -> Self {
        Self {
            state: Xxh3::new(),
            recipe: Some(Vec::new()),
        }
    }

    /// Combines a value into the running digest.
    pub fn combine<T: StableHash + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.stable_hash(self);
        self
    }

    /// Finishes hashing and returns the fingerprint.
    pub fn finalize(&self) -> Fingerprint {
        Fingerprint(self.state.digest128().to_le_bytes())
    }

    /// Finishes hashing and returns the fingerprint with its recipe, if one
    /// was recorded.
    pub fn finalize_with_recipe(self) -> (Fingerprint, Option<Recipe>) {
        let fp = self.finalize();
        (fp, self.recipe.map(Recipe))
    }

    /// Writes a kind byte.
    pub fn write_tag(&mut self, tag: u8) {
        self.write_raw(&[TAG_U8, tag]);
    }

    /// Writes a length-prefixed byte string.
    pub fn write_str(&mut self, s: &str) {
        self.write_raw(&[TAG_STR]);
        self.write_raw(&(s.len() as u64).to_le_bytes());
        self.write_raw(s.as_bytes());
    }

    /// Writes a float by canonical value.
    pub fn write_f64(&mut self, v: f64) {
        self.write_raw(&[TAG_F64]);
        self.write_raw(&canonical_f64_bits(v).to_le_bytes());
    }

    /// Writes a signed integer.
    pub fn write_i64(&mut self, v: i64) {
        self.write_raw(&[TAG_I64]);
        self.write_raw(&v.to_le_bytes());
    }

    /// Writes a boolean.
    pub fn write_bool(&mut self, v: bool) {
        self.write_raw(&[TAG_BOOL, u8::from(v)]);
    }

    /// Writes the start of a sequence of `len` items.
    pub fn write_seq_len(&mut self, len: usize) {
        self.write_raw(&[TAG_SEQ]);
        self.write_raw(&(len as u64).to_le_bytes());
    }

    fn write_fingerprint(&mut self, fp: &Fingerprint) {
        self.write_raw(&[TAG_FINGERPRINT]);
        self.write_raw(&fp.0);
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
        if let Some(recipe) = &mut self.recipe {
            recipe.extend_from_slice(bytes);
        }
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the bit pattern a float is hashed by.
///
/// `-0.0` hashes like `0.0` and every NaN hashes like the canonical quiet NaN,
/// so numerically equal parameters always fingerprint identically.
pub fn canonical_f64_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0u64
    } else {
        v.to_bits()
    }
}

/// Types that can be combined into a [`FingerprintHasher`].
///
/// Implementations must be pure: the bytes written may depend only on the
/// value itself, never on memory addresses, interner indices, or time.
pub trait StableHash {
    /// Writes the canonical encoding of `self` into the hasher.
    fn stable_hash(&self, hasher: &mut FingerprintHasher);
}

impl StableHash for Fingerprint {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_fingerprint(self);
    }
}

impl StableHash for str {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_str(self);
    }
}

impl StableHash for String {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_str(self);
    }
}

impl StableHash for f64 {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_f64(*self);
    }
}

impl StableHash for i64 {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_i64(*self);
    }
}

impl StableHash for bool {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_bool(*self);
    }
}

impl<T: StableHash> StableHash for [T] {
    fn stable_hash(&self, hasher: &mut FingerprintHasher) {
        hasher.write_seq_len(self.len());
        for item in self {
            item.stable_hash(hasher);
        }
    }
}
