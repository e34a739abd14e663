//! Conversion of evaluation outcomes into coded diagnostics.

use forma_diagnostics::{Category, Diagnostic, DiagnosticCode, Origin};
use forma_query::QueryError;

use crate::error::{EvalError, FeatureRef};

/// A parameter was rejected before building.
pub const E_PARAMETER: DiagnosticCode = DiagnosticCode::new(Category::Error, 100);
/// The geometry engine failed to build a feature.
pub const E_BUILD: DiagnosticCode = DiagnosticCode::new(Category::Error, 101);
/// The feature graph contains a cycle.
pub const E_CYCLE: DiagnosticCode = DiagnosticCode::new(Category::Error, 102);
/// A deferred query could not be resolved.
pub const E_QUERY: DiagnosticCode = DiagnosticCode::new(Category::Error, 103);
/// The rebuild was cancelled.
pub const E_CANCELLED: DiagnosticCode = DiagnosticCode::new(Category::Error, 104);
/// An evaluator invariant was violated.
pub const E_INTERNAL: DiagnosticCode = DiagnosticCode::new(Category::Error, 199);
/// A fingerprint matched a cache entry built from different inputs.
pub const W_COLLISION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 100);

/// The diagnostic origin of a feature.
pub fn origin(feature: &FeatureRef) -> Origin {
    match &feature.label {
        Some(label) => Origin::labelled(label.clone(), feature.type_tag.clone()),
        None => Origin::anonymous(feature.type_tag.clone()),
    }
}

/// Describes an evaluation error.
pub fn diagnostic(err: &EvalError) -> Diagnostic {
    let message = err.to_string();
    match err {
        EvalError::Parameter { feature, within, .. } => {
            nest(Diagnostic::error(E_PARAMETER, message, origin(feature)), within)
        }
        EvalError::Build { feature, within, .. } => {
            nest(Diagnostic::error(E_BUILD, message, origin(feature)), within)
        }
        EvalError::Cycle { path } => {
            let first = path.first().map(origin).unwrap_or_default();
            Diagnostic::error(E_CYCLE, message, first)
                .with_help("remove one of the references that closes the loop")
        }
        EvalError::Cancelled { before } => Diagnostic::error(E_CANCELLED, message, origin(before))
            .with_note("no cache entries were evicted by the cancelled pass"),
        EvalError::Graph(_) | EvalError::Cache(_) | EvalError::Internal(_) => {
            Diagnostic::error(E_INTERNAL, message, Origin::default())
        }
    }
}

/// Describes a query that failed to resolve for the given feature.
pub fn query_diagnostic(err: &QueryError, at: Origin) -> Diagnostic {
    let diag = Diagnostic::error(E_QUERY, err.to_string(), at);
    match err {
        QueryError::NotReady { .. } => {
            diag.with_help("a query can only be resolved after its feature has been built")
        }
        QueryError::Cardinality { .. } => {
            diag.with_help("tighten the selection predicate so it matches one entity")
        }
        _ => diag,
    }
}

/// Warns that a feature was rebuilt because of a fingerprint collision.
pub fn collision(feature: &FeatureRef) -> Diagnostic {
    Diagnostic::warning(
        W_COLLISION,
        format!("fingerprint of `{feature}` collides with a different cached feature"),
        origin(feature),
    )
    .with_note("the feature was rebuilt and the cache entry replaced")
}

fn nest(mut diag: Diagnostic, within: &[FeatureRef]) -> Diagnostic {
    for outer in within {
        diag = diag.within(origin(outer));
    }
    diag
}
