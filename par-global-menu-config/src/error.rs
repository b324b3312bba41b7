//! Typed error variants for the par-global-menu-config crate.
//!
//! `MirrorConfig::load` and `MirrorConfig::save_to` still return
//! `anyhow::Result`; callers that care about the failure mode can
//! `downcast_ref::<ConfigError>()`.

use thiserror::Error;

/// Errors that can occur when loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred reading or writing the config file.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file contained invalid YAML.
    #[error("YAML parse error in config: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// A field value failed semantic validation.
    #[error("Invalid config value: {0}")]
    Validation(String),

    /// An environment override could not be interpreted.
    #[error("Invalid value '{value}' for environment variable {name}")]
    EnvOverride {
        /// Full variable name, including the prefix.
        name: String,
        /// The raw value that failed to parse.
        value: String,
    },
}
