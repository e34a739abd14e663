//! Configuration types deserialized from `forma.toml`.

use serde::Deserialize;

/// Top-level evaluation settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormaConfig {
    /// Feature cache behavior.
    pub cache: CacheConfig,
    /// Evaluator behavior.
    pub evaluator: EvaluatorConfig,
    /// Deferred query resolution.
    pub query: QueryConfig,
    /// Logging.
    pub log: LogConfig,
}

/// `[cache]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Record the bytes behind every fingerprint and compare them on a hit.
    /// A mismatch is treated as a collision and rebuilt. Default `true`.
    pub verify_recipes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            verify_recipes: true,
        }
    }
}

/// `[evaluator]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Keep evaluating a node's remaining dependencies after one of them
    /// fails, so their cache entries survive the sweep. Default `true`.
    pub continue_after_failure: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            continue_after_failure: true,
        }
    }
}

/// `[query]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Geometric tolerance for containment and extremal comparisons.
    /// Default `1e-7`.
    pub tolerance: f64,
    /// Maximum nesting of named rules. Default `32`.
    pub max_rule_depth: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-7,
            max_rule_depth: 32,
        }
    }
}

/// `[log]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"forma_cache=debug"`.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
