//! Incremental evaluation of feature graphs.
//!
//! The [`Evaluator`] walks a [`FeatureGraph`](forma_graph::FeatureGraph)
//! in post-order, fingerprints every node from its type, parameters and
//! dependency fingerprints, and either adopts a cached [`BuildOutput`] or
//! asks the [`GeometryEngine`] to build it. A [`Session`] wraps that in
//! rebuild passes over a shared generational cache, so nodes no pass
//! reaches any more are evicted while unchanged subtrees are reused.

#![warn(missing_docs)]

pub mod cancel;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod fingerprint;
pub mod report;
pub mod session;
pub mod telemetry;

pub use cancel::CancellationToken;
pub use engine::{BuildFailure, BuildInput, BuildOutput, GeometryEngine, Output};
pub use error::{EvalError, FeatureRef};
pub use evaluator::{EvalOptions, EvalStats, Evaluator};
pub use fingerprint::node_fingerprint;
pub use session::{Document, RebuildReport, Session};
pub use telemetry::{init_tracing, TelemetryError};
