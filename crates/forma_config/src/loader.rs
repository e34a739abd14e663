//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::FormaConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "forma.toml";

/// Loads `<dir>/forma.toml`.
///
/// A directory without the file yields the defaults; any other I/O failure
/// is an error.
pub fn load_config(dir: &Path) -> Result<FormaConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    match std::fs::read_to_string(&path) {
        Ok(content) => load_config_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && dir.is_dir() => {
            Ok(FormaConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parses and validates configuration text.
pub fn load_config_from_str(content: &str) -> Result<FormaConfig, ConfigError> {
    let config: FormaConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks value ranges that the type system does not express.
pub fn validate_config(config: &FormaConfig) -> Result<(), ConfigError> {
    let tol = config.query.tolerance;
    if !tol.is_finite() || tol < 0.0 {
        return Err(ConfigError::Invalid {
            field: "query.tolerance",
            reason: format!("must be finite and non-negative, got {tol}"),
        });
    }
    if config.query.max_rule_depth == 0 {
        return Err(ConfigError::Invalid {
            field: "query.max_rule_depth",
            reason: "must be at least 1".to_string(),
        });
    }
    if config.log.filter.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "log.filter",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}
