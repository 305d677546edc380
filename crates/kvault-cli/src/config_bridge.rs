//! Bridge from `kvault_config::Config` to a live store and a log config.

use std::sync::Arc;

use anyhow::Context;
use kvault_config::{Config, StorageConfig};
use kvault_storage::{
    CacheStorage, EventStorage, FileSystemStorage, ListenerVerdict, MemoryStorage, MultiStorage,
    SingleFileStorage, Storage, StorageEvent,
};
use kvault_telemetry::{FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget};
use tracing::{debug, info};

/// Build the configured store: backend, then events, then cache.
///
/// # Errors
///
/// Returns an error if the event listener cannot be registered.
pub fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let mut store = build_backend(&config.storage);

    if config.events.enabled {
        let events = EventStorage::with_capacity(store, config.events.capacity);
        events
            .add_listener(Arc::new(log_event))
            .context("failed to register event logger")?;
        store = Arc::new(events);
    }

    if config.cache.enabled {
        store = Arc::new(CacheStorage::new(store, config.cache.ttl()));
    }

    debug!(
        backend = config.storage.kind(),
        events = config.events.enabled,
        cache = config.cache.enabled,
        "Built storage stack"
    );
    Ok(store)
}

/// Build one backend, recursing into `multi`.
#[must_use]
pub fn build_backend(config: &StorageConfig) -> Arc<dyn Storage> {
    match config {
        StorageConfig::Memory => {
            info!("Using in-memory storage; nothing will persist after exit");
            Arc::new(MemoryStorage::new())
        },
        StorageConfig::Fs { dir } => Arc::new(FileSystemStorage::new(dir)),
        StorageConfig::SingleFile { path } => Arc::new(SingleFileStorage::new(path)),
        StorageConfig::Multi { backends } => Arc::new(MultiStorage::new(
            backends.iter().map(build_backend).collect(),
        )),
    }
}

fn log_event(event: &StorageEvent) -> ListenerVerdict {
    debug!(
        event = %event.event_type(),
        namespace = event.namespace(),
        key = event.key(),
        "Storage event"
    );
    ListenerVerdict::Continue
}

/// Convert the `[logging]` section to a telemetry config.
///
/// Unknown format, target or rotation values fall back to the defaults;
/// the config crate has already rejected them during validation.
#[must_use]
pub fn to_log_config(config: &Config) -> LogConfig {
    let logging = &config.logging;
    let format = logging.format.parse::<LogFormat>().unwrap_or_default();
    let mut log = LogConfig::new(logging.level.clone()).with_format(format);

    match (logging.target.as_str(), &logging.dir) {
        ("stdout", _) => log = log.with_target(LogTarget::Stdout),
        ("file", Some(dir)) => {
            log = log.with_file_logging(dir.clone());
            log.file = FileLogConfig {
                rotation: match logging.rotation.as_str() {
                    "hourly" => FileRotation::Hourly,
                    "never" => FileRotation::Never,
                    _ => FileRotation::Daily,
                },
                max_files: logging.max_files,
                ..FileLogConfig::default()
            };
        },
        _ => {},
    }

    logging
        .directives
        .iter()
        .fold(log, |log, directive| log.with_directive(directive.clone()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use futures::TryStreamExt;
    use serde_json::json;

    use super::*;

    fn doc(value: serde_json::Value) -> kvault_storage::Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_default_config_builds_memory_store() {
        let store = build_storage(&Config::default()).unwrap();
        store.set("items", "1", doc(json!({"a": 1}))).await.unwrap();
        assert!(store.has("items", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_full_stack_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage = StorageConfig::Multi {
            backends: vec![
                StorageConfig::Fs {
                    dir: dir.path().join("docs"),
                },
                StorageConfig::SingleFile {
                    path: dir.path().join("all.json"),
                },
            ],
        };
        config.events.enabled = true;
        config.cache.enabled = true;
        config.cache.ttl_ms = Some(60_000);

        let store = build_storage(&config).unwrap();
        store.set("items", "1", doc(json!({"status": 0}))).await.unwrap();

        assert!(dir.path().join("docs").join("items").join("1.json").is_file());
        assert!(dir.path().join("all.json").is_file());

        let keys: Vec<String> = store.keys("items").try_collect().await.unwrap();
        assert_eq!(keys, vec!["1"]);
    }

    #[tokio::test]
    async fn test_file_backends_persist_across_builds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage = StorageConfig::SingleFile {
            path: dir.path().join("store.json"),
        };

        build_storage(&config)
            .unwrap()
            .set("items", "1", doc(json!({"v": 1})))
            .await
            .unwrap();

        let reopened = build_storage(&config).unwrap();
        assert_eq!(
            reopened.get("items", "1").await.unwrap(),
            Some(doc(json!({"v": 1})))
        );
    }

    #[test]
    fn test_to_log_config() {
        let mut config = Config::default();
        config.logging.level = "debug".to_owned();
        config.logging.format = "json".to_owned();
        config.logging.directives = vec!["kvault_storage=trace".to_owned()];

        let log = to_log_config(&config);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["kvault_storage=trace"]);
        assert_eq!(log.target, LogTarget::Stderr);
    }

    #[test]
    fn test_to_log_config_file_target() {
        let mut config = Config::default();
        config.logging.target = "file".to_owned();
        config.logging.dir = Some(PathBuf::from("/var/log/kvault"));
        config.logging.rotation = "hourly".to_owned();
        config.logging.max_files = 24;

        let log = to_log_config(&config);
        assert_eq!(log.target, LogTarget::File(PathBuf::from("/var/log/kvault")));
        assert_eq!(log.file.rotation, FileRotation::Hourly);
        assert_eq!(log.file.max_files, 24);
        assert_eq!(log.file.prefix, "kvault");
        assert!(!log.ansi);
    }

    #[test]
    fn test_to_log_config_stdout_target() {
        let mut config = Config::default();
        config.logging.target = "stdout".to_owned();
        assert_eq!(to_log_config(&config).target, LogTarget::Stdout);
    }
}
