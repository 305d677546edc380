use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("Failed to read config file at {}: {source}", path.display())]
    ReadError {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A config layer is not valid TOML, or the merged tree does not fit
    /// [`Config`](crate::Config).
    #[error("Failed to parse config from {origin}: {source}")]
    ParseError {
        /// Where the TOML came from (a path, or a placeholder such as
        /// `<embedded defaults>`).
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A `KVAULT_*` override could not be converted to the field's type.
    #[error("Environment variable '{var_name}': {message}")]
    EnvError {
        /// Name of the environment variable.
        var_name: String,
        /// Error description.
        message: String,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
