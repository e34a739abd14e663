//! Interned feature type tags.

use lasso::{Rodeo, Spur};

/// An interned operation kind (`Box`, `Cylinder`, `Union`).
///
/// The key reflects insertion order in one [`TypeTags`] table and must never
/// reach a fingerprint; hash the name from [`TypeTags::name`] instead.
pub type TypeTag = Spur;

/// The operation kinds used by one feature graph, each stored once.
#[derive(Debug, Default)]
pub struct TypeTags(Rodeo);

impl TypeTags {
    /// Returns the tag for `name`, interning it on first use.
    pub fn intern(&mut self, name: &str) -> TypeTag {
        self.0.get_or_intern(name)
    }

    /// The name behind a tag, or `None` for a tag from another table.
    pub fn name(&self, tag: TypeTag) -> Option<&str> {
        self.0.try_resolve(&tag)
    }

    /// Number of distinct operation kinds.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no kind has been interned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
