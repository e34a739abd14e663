//! Result type for evaluator invariant violations.

/// The result type for operations that can only fail through a bug.
///
/// User-facing failures (bad parameters, rejected geometry, cyclic scripts)
/// have their own error enums; `Err(InternalError)` means the evaluator's own
/// bookkeeping was violated, e.g. `build()` was entered twice for one node.
pub type FormaResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in the engine, not in the user's script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal evaluator error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
