//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, StorageConfig};

/// Deepest allowed nesting of `multi` backends.
const MAX_STORAGE_DEPTH: usize = 8;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_storage(&config.storage, "storage", 0)?;
    validate_cache(config)?;
    validate_events(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_storage(storage: &StorageConfig, field: &str, depth: usize) -> ConfigResult<()> {
    if depth > MAX_STORAGE_DEPTH {
        return Err(invalid(
            field,
            format!("multi backends nested deeper than {MAX_STORAGE_DEPTH} levels"),
        ));
    }
    match storage {
        StorageConfig::Memory => Ok(()),
        StorageConfig::Fs { dir } => {
            if dir.as_os_str().is_empty() {
                return Err(invalid(format!("{field}.dir"), "must not be empty"));
            }
            Ok(())
        },
        StorageConfig::SingleFile { path } => {
            if path.as_os_str().is_empty() {
                return Err(invalid(format!("{field}.path"), "must not be empty"));
            }
            if path.file_name().is_none() {
                return Err(invalid(format!("{field}.path"), "must name a file"));
            }
            Ok(())
        },
        StorageConfig::Multi { backends } => {
            for (index, backend) in backends.iter().enumerate() {
                validate_storage(
                    backend,
                    &format!("{field}.backends[{index}]"),
                    depth.saturating_add(1),
                )?;
            }
            Ok(())
        },
    }
}

fn validate_cache(config: &Config) -> ConfigResult<()> {
    if config.cache.ttl_ms == Some(0) {
        return Err(invalid(
            "cache.ttl_ms",
            "must be positive; omit it to cache until the next write",
        ));
    }
    Ok(())
}

fn validate_events(config: &Config) -> ConfigResult<()> {
    if config.events.capacity == 0 {
        return Err(invalid("events.capacity", "must be at least 1"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    match config.logging.target.as_str() {
        "stdout" | "stderr" => {},
        "file" => {
            let has_dir = config
                .logging
                .dir
                .as_ref()
                .is_some_and(|dir| !dir.as_os_str().is_empty());
            if !has_dir {
                return Err(invalid(
                    "logging.dir",
                    "a log directory is required when target is 'file'",
                ));
            }
        },
        other => {
            return Err(invalid(
                "logging.target",
                format!("unsupported log target '{other}'; expected one of: stdout, stderr, file"),
            ));
        },
    }

    let valid_rotations = ["daily", "hourly", "never"];
    if !valid_rotations.contains(&config.logging.rotation.as_str()) {
        return Err(invalid(
            "logging.rotation",
            format!(
                "unsupported rotation '{}'; expected one of: {}",
                config.logging.rotation,
                valid_rotations.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_fs_dir() {
        let mut config = Config::default();
        config.storage = StorageConfig::Fs {
            dir: PathBuf::new(),
        };
        assert_eq!(field_of(validate(&config)), "storage.dir");
    }

    #[test]
    fn test_nested_field_path() {
        let mut config = Config::default();
        config.storage = StorageConfig::Multi {
            backends: vec![
                StorageConfig::Memory,
                StorageConfig::SingleFile {
                    path: PathBuf::from("/"),
                },
            ],
        };
        assert_eq!(field_of(validate(&config)), "storage.backends[1].path");
    }

    #[test]
    fn test_empty_multi_is_valid() {
        let mut config = Config::default();
        config.storage = StorageConfig::Multi { backends: vec![] };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_too_deep() {
        let mut storage = StorageConfig::Memory;
        for _ in 0..=MAX_STORAGE_DEPTH {
            storage = StorageConfig::Multi {
                backends: vec![storage],
            };
        }
        let mut config = Config::default();
        config.storage = storage;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_ttl() {
        let mut config = Config::default();
        config.cache.ttl_ms = Some(0);
        assert_eq!(field_of(validate(&config)), "cache.ttl_ms");
    }

    #[test]
    fn test_zero_capacity() {
        let mut config = Config::default();
        config.events.capacity = 0;
        assert_eq!(field_of(validate(&config)), "events.capacity");
    }

    #[test]
    fn test_bad_level_and_format() {
        let mut config = Config::default();
        config.logging.level = "loud".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.level");

        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");
    }

    #[test]
    fn test_file_target_needs_dir() {
        let mut config = Config::default();
        config.logging.target = "file".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.dir");

        config.logging.dir = Some(PathBuf::new());
        assert_eq!(field_of(validate(&config)), "logging.dir");

        config.logging.dir = Some(PathBuf::from("logs"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_target_and_rotation() {
        let mut config = Config::default();
        config.logging.target = "syslog".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.target");

        let mut config = Config::default();
        config.logging.rotation = "weekly".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.rotation");
    }
}
