#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for kvault.
//!
//! A single [`Config`] describes which storage backend to build, whether to
//! wrap it with events and a cache, and how to log.
//!
//! # Usage
//!
//! ```rust,no_run
//! use kvault_config::{Config, LoadOptions};
//!
//! let resolved = Config::load(&LoadOptions::default()).unwrap();
//! println!("backend: {}", resolved.config.storage.kind());
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`KVAULT_*`)
//! 2. **Explicit file** (`--config path`)
//! 3. **User** (`~/.config/kvault/config.toml` or the platform equivalent)
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! Layers are merged as TOML trees before deserialization, so a layer only
//! needs to name the fields it changes.
//!
//! # Design
//!
//! This crate does not depend on `kvault-storage`. Building a store from a
//! [`StorageConfig`] happens in the binary.

/// `KVAULT_*` environment overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// TOML tree merging.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{LoadOptions, ResolvedConfig};
pub use types::*;

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// See [`loader::load`] for the full algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
        loader::load(options)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
