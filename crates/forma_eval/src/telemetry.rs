//! Tracing subscriber setup.

use forma_config::LogConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Errors raised by [`init_tracing`].
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directive does not parse.
    #[error("invalid log filter `{filter}`: {message}")]
    InvalidFilter {
        /// The configured directive.
        filter: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber was installed earlier.
    #[error("tracing is already initialised: {0}")]
    AlreadyInitialized(String),
}

/// Installs a console subscriber filtered by `RUST_LOG`, falling back to the
/// configured filter when the variable is unset.
///
/// Calling it twice returns [`TelemetryError::AlreadyInitialized`]; the
/// first subscriber stays in place.
pub fn init_tracing(config: &LogConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: config.filter.clone(),
            message: e.to_string(),
        })?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().without_time().with_target(true))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}
