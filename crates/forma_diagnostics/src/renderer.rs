//! Human-readable rendering.

use crate::diagnostic::Diagnostic;

/// Formats a diagnostic for some output target.
pub trait DiagnosticRenderer {
    /// Renders one diagnostic.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-like console format:
///
/// ```text
/// error[E101]: fillet radius exceeds edge length
///   --> `f1` (Fillet)
///    | while building `u1` (Union)
///    = note: ...
///    = help: ...
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let head = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return head;
        }
        let ansi = match diag.severity {
            crate::Severity::Error => "31",
            crate::Severity::Warning => "33",
            crate::Severity::Note => "36",
        };
        format!("\x1b[1;{ansi}m{head}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.header(diag), diag.message);

        if !diag.origin.is_document() {
            out.push_str(&format!("  --> {}\n", diag.origin));
        }
        for outer in &diag.context {
            out.push_str(&format!("   | while building {outer}\n"));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}
