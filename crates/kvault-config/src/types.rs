//! Configuration types.
//!
//! Every section implements [`Default`] so that a partial file, or none at
//! all, still yields a usable configuration. The defaults here match the
//! embedded `defaults.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a kvault process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend tree.
    pub storage: StorageConfig,
    /// Read-through cache in front of the backend.
    pub cache: CacheSection,
    /// Mutation events.
    pub events: EventsSection,
    /// Log level, format, target and directives.
    pub logging: LoggingSection,
}

/// Which backend to build, tagged by `backend`.
///
/// ```toml
/// [storage]
/// backend = "multi"
///
/// [[storage.backends]]
/// backend = "memory"
///
/// [[storage.backends]]
/// backend = "fs"
/// dir = "/var/lib/kvault"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StorageConfig {
    /// Process memory; nothing survives a restart.
    #[default]
    Memory,
    /// One JSON file per document under `dir`.
    Fs {
        /// Root directory.
        dir: PathBuf,
    },
    /// Every document in one JSON file.
    SingleFile {
        /// Path of the file.
        path: PathBuf,
    },
    /// Fan-out over `backends`, in priority order.
    Multi {
        /// Composed backends.
        #[serde(default)]
        backends: Vec<StorageConfig>,
    },
}

impl StorageConfig {
    /// Tag value as written in TOML.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Fs { .. } => "fs",
            Self::SingleFile { .. } => "single-file",
            Self::Multi { .. } => "multi",
        }
    }
}

/// Cache adapter settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Whether to put a cache in front of the backend.
    pub enabled: bool,
    /// Time to live in milliseconds. Unset caches until the next write.
    pub ttl_ms: Option<u64>,
}

impl CacheSection {
    /// The TTL as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

/// Event wrapper settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsSection {
    /// Whether to wrap the backend with event emission.
    pub enabled: bool,
    /// Per-subscriber buffer size.
    pub capacity: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 256,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["kvault_storage=debug"]`).
    pub directives: Vec<String>,
    /// Where logs go: `"stderr"`, `"stdout"` or `"file"`.
    pub target: String,
    /// Log directory. Required when `target = "file"`.
    pub dir: Option<PathBuf>,
    /// File rotation: `"daily"`, `"hourly"` or `"never"`.
    pub rotation: String,
    /// Rotated files to keep; 0 keeps all of them.
    pub max_files: usize,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
            target: "stderr".to_owned(),
            dir: None,
            rotation: "daily".to_owned(),
            max_files: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn test_storage_tags() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "single-file"
            path = "/tmp/kvault.json"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::SingleFile {
                path: PathBuf::from("/tmp/kvault.json")
            }
        );
        assert_eq!(config.storage.kind(), "single-file");
    }

    #[test]
    fn test_nested_multi() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "multi"

            [[storage.backends]]
            backend = "memory"

            [[storage.backends]]
            backend = "fs"
            dir = "data"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Multi {
                backends: vec![
                    StorageConfig::Memory,
                    StorageConfig::Fs {
                        dir: PathBuf::from("data")
                    },
                ]
            }
        );
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [storage]
            backend = "redis"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_file_logging_section() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            target = "file"
            dir = "/var/log/kvault"
            rotation = "hourly"
            max_files = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.target, "file");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/kvault")));
        assert_eq!(config.logging.rotation, "hourly");
        assert_eq!(config.logging.max_files, 24);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_cache_ttl() {
        let section = CacheSection {
            enabled: true,
            ttl_ms: Some(1500),
        };
        assert_eq!(section.ttl(), Some(Duration::from_millis(1500)));
        assert_eq!(CacheSection::default().ttl(), None);
    }
}
