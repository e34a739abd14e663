//! Coded, user-visible diagnostics for feature evaluation.
//!
//! A [`Diagnostic`] names the feature it concerns through an [`Origin`]
//! (script label and operation kind) rather than a source span, since the
//! evaluator only ever sees compiled nodes. The thread-safe
//! [`DiagnosticSink`] collects them during a rebuild pass and
//! [`TerminalRenderer`] formats them for a console.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod origin;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use origin::Origin;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
