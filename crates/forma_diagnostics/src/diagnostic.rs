//! Structured diagnostic messages.

use crate::code::DiagnosticCode;
use crate::origin::Origin;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// A user-visible report about one feature.
///
/// `context` lists the features through which the problem surfaced,
/// innermost first: a failed fillet reached while building `u1` and then
/// `shell` carries `[u1, shell]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level.
    pub severity: Severity,
    /// Stable code identifying the kind of problem.
    pub code: DiagnosticCode,
    /// The main message.
    pub message: String,
    /// The feature the problem originated at.
    pub origin: Origin,
    /// Enclosing features, innermost first.
    pub context: Vec<Origin>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            origin,
            context: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, origin: Origin) -> Self {
        Self::with_severity(Severity::Error, code, message, origin)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, origin: Origin) -> Self {
        Self::with_severity(Severity::Warning, code, message, origin)
    }

    /// Creates an informational note.
    pub fn note(code: DiagnosticCode, message: impl Into<String>, origin: Origin) -> Self {
        Self::with_severity(Severity::Note, code, message, origin)
    }

    /// Appends an enclosing feature.
    pub fn within(mut self, outer: Origin) -> Self {
        self.context.push(outer);
        self
    }

    /// Adds a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}
