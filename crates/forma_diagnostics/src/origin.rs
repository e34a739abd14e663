//! The feature a diagnostic is about.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the node a diagnostic concerns.
///
/// Node ids are meaningless to a user across re-parses, so an origin keeps
/// the script symbol and operation kind instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// The script symbol the node was bound to, if any.
    pub label: Option<String>,
    /// The operation kind (`Box`, `Union`, `Fillet`).
    pub type_tag: String,
}

impl Origin {
    /// An origin for a labelled node.
    pub fn labelled(label: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            type_tag: type_tag.into(),
        }
    }

    /// An origin for an anonymous node.
    pub fn anonymous(type_tag: impl Into<String>) -> Self {
        Self {
            label: None,
            type_tag: type_tag.into(),
        }
    }

    /// Returns `true` when the origin names no feature (document-level).
    pub fn is_document(&self) -> bool {
        self.label.is_none() && self.type_tag.is_empty()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "`{label}` ({})", self.type_tag),
            None if self.type_tag.is_empty() => write!(f, "document"),
            None => write!(f, "anonymous {}", self.type_tag),
        }
    }
}
