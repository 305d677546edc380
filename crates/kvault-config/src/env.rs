//! `KVAULT_*` environment overrides.
//!
//! Environment variables are the highest-precedence layer: a set variable
//! replaces whatever the files said.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::set_path;

/// Prefix shared by every recognised variable.
pub const ENV_PREFIX: &str = "KVAULT_";

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Bool,
    Int,
}

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: Kind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "KVAULT_STORAGE_BACKEND",
        field_path: "storage.backend",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "KVAULT_STORAGE_DIR",
        field_path: "storage.dir",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "KVAULT_STORAGE_PATH",
        field_path: "storage.path",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "KVAULT_CACHE_ENABLED",
        field_path: "cache.enabled",
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "KVAULT_CACHE_TTL_MS",
        field_path: "cache.ttl_ms",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "KVAULT_EVENTS_ENABLED",
        field_path: "events.enabled",
        kind: Kind::Bool,
    },
    EnvMapping {
        var_name: "KVAULT_EVENTS_CAPACITY",
        field_path: "events.capacity",
        kind: Kind::Int,
    },
    EnvMapping {
        var_name: "KVAULT_LOG_LEVEL",
        field_path: "logging.level",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "KVAULT_LOG_FORMAT",
        field_path: "logging.format",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "KVAULT_LOG_TARGET",
        field_path: "logging.target",
        kind: Kind::Str,
    },
    EnvMapping {
        var_name: "KVAULT_LOG_DIR",
        field_path: "logging.dir",
        kind: Kind::Str,
    },
];

/// Snapshot the process environment, keeping only `KVAULT_*` variables.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply every recognised variable in `env_vars` to the merged tree.
///
/// Returns the number of overrides applied. Unrecognised `KVAULT_*`
/// variables are ignored.
///
/// # Errors
///
/// Returns [`ConfigError::EnvError`] if a value cannot be converted to the
/// field's type.
pub fn apply_env_overrides<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let value = coerce(mapping, raw)?;
        if !set_path(merged, mapping.field_path, value) {
            return Err(ConfigError::EnvError {
                var_name: mapping.var_name.to_owned(),
                message: format!("cannot set '{}'", mapping.field_path),
            });
        }
        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applied env var override"
        );
        count = count.saturating_add(1);
    }

    Ok(count)
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    let raw = raw.trim();
    let invalid = |expected: &str| ConfigError::EnvError {
        var_name: mapping.var_name.to_owned(),
        message: format!("expected {expected}, got '{raw}'"),
    };
    match mapping.kind {
        Kind::Str => Ok(toml::Value::String(raw.to_owned())),
        Kind::Bool => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Ok(toml::Value::Boolean(false)),
            _ => Err(invalid("a boolean")),
        },
        Kind::Int => raw
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .map(toml::Value::Integer)
            .ok_or_else(|| invalid("a non-negative integer")),
    }
}
