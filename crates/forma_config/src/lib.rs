//! Loading and validation of `forma.toml` evaluation settings.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults documented on each field of [`FormaConfig`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config, CONFIG_FILE_NAME};
pub use types::*;
