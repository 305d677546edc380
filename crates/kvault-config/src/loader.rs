//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge the user file (`<config dir>/kvault/config.toml`)
//! 3. Merge the explicit file, if one was given
//! 4. Apply `KVAULT_*` overrides
//! 5. Deserialize merged tree → `Config`
//! 6. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_overrides, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::deep_merge;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: usize = 1_048_576;

/// A loaded configuration and the files it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Files that contributed, lowest precedence first.
    pub loaded_files: Vec<PathBuf>,
    /// Number of `KVAULT_*` overrides applied.
    pub env_overrides: usize,
}

/// Where [`load`] looks for files.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// File given on the command line. Must exist.
    pub explicit: Option<PathBuf>,
    /// Replaces the platform config directory for the user file.
    pub config_dir: Option<PathBuf>,
    /// Skip the user file entirely.
    pub skip_user: bool,
}

/// Load configuration from the process environment and the file system.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any layer is malformed or the final
/// configuration fails validation.
pub fn load(options: &LoadOptions) -> ConfigResult<ResolvedConfig> {
    load_with_env(options, &collect_env_vars())
}

/// Like [`load`], with an explicit set of environment variables.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any layer is malformed or the final
/// configuration fails validation.
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    options: &LoadOptions,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            origin: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut loaded_files = Vec::new();

    // 2. User file.
    if !options.skip_user {
        if let Some(user_path) = user_config_path(options.config_dir.as_deref()) {
            if let Some(overlay) = try_load_file(&user_path)? {
                deep_merge(&mut merged, &overlay);
                info!(path = %user_path.display(), "loaded user config");
                loaded_files.push(user_path);
            }
        } else {
            debug!("no platform config directory, skipping user config");
        }
    }

    // 3. Explicit file.
    if let Some(path) = &options.explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
        })?;
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded config file");
        loaded_files.push(path.clone());
    }

    // 4. Environment.
    let env_overrides = apply_env_overrides(&mut merged, env_vars)?;
    if env_overrides > 0 {
        debug!(count = env_overrides, "applied environment overrides");
    }

    // 5. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                origin: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
        env_overrides,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read_bounded(path)?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        origin: path.display().to_string(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// `<dir>/config.toml` if `dir` is given, otherwise the platform config
/// directory for kvault (e.g. `~/.config/kvault/config.toml`).
#[must_use]
pub fn user_config_path(dir: Option<&Path>) -> Option<PathBuf> {
    match dir {
        Some(dir) => Some(dir.join("config.toml")),
        None => directories::ProjectDirs::from("", "", "kvault")
            .map(|dirs| dirs.config_dir().join("config.toml")),
    }
}

fn read_bounded(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }
    Ok(content)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match read_bounded(path) {
        Ok(c) => c,
        Err(ConfigError::ReadError { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => return Err(e),
    };

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        origin: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}
