//! kvault CLI - inspect and edit namespaced JSON stores.
//!
//! The store is built from layered configuration (see `kvault-config`):
//! a backend, optionally wrapped with events and a read-through cache.
//! Documents are printed to stdout as JSON; status messages go to stderr.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use kvault_config::{Config, LoadOptions};
use kvault_storage::Storage;
use kvault_telemetry::LogFormat;
use tracing::debug;

mod commands;
mod config_bridge;
mod theme;

use commands::{Condition, Outcome, Output, parse_condition, parse_document, read, write};
use theme::Theme;

/// kvault - namespaced JSON document storage
#[derive(Parser)]
#[command(name = "kvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file, merged over the user config
    #[arg(short, long, global = true, env = "KVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log format: pretty, compact, json or full
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the keys in a namespace
    Keys {
        /// Namespace slug
        namespace: String,
    },

    /// Print every document in a namespace
    Values {
        /// Namespace slug
        namespace: String,
    },

    /// Print key/document pairs, optionally filtered
    List {
        /// Namespace slug
        namespace: String,

        /// Only entries whose FIELD equals VALUE (repeatable)
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE", value_parser = parse_condition)]
        conditions: Vec<Condition>,
    },

    /// Print the first entry matching every condition
    Find {
        /// Namespace slug
        namespace: String,

        /// FIELD equals VALUE (repeatable)
        #[arg(short = 'w', long = "where", value_name = "FIELD=VALUE", value_parser = parse_condition, required = true)]
        conditions: Vec<Condition>,
    },

    /// Print one document
    Get {
        /// Namespace slug
        namespace: String,
        /// Key slug
        key: String,
    },

    /// Check whether a document exists
    Has {
        /// Namespace slug
        namespace: String,
        /// Key slug
        key: String,
    },

    /// Store a document, replacing any existing one
    Set {
        /// Namespace slug
        namespace: String,
        /// Key slug
        key: String,
        /// JSON object, or `-` to read from stdin
        value: String,
    },

    /// Shallow-merge fields into an existing document
    Update {
        /// Namespace slug
        namespace: String,
        /// Key slug
        key: String,
        /// JSON object, or `-` to read from stdin
        patch: String,
    },

    /// Delete a document
    Delete {
        /// Namespace slug
        namespace: String,
        /// Key slug
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let options = LoadOptions {
        explicit: cli.config.clone(),
        ..LoadOptions::default()
    };
    let resolved = Config::load(&options).context("failed to load configuration")?;

    // Set up logging from config, with CLI overrides.
    let mut log_config =
        config_bridge::to_log_config(&resolved.config).with_verbosity(cli.verbose);
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format);
    }
    let _log_guard = match kvault_telemetry::setup_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!(
                "{}",
                Theme::warning(&format!("Failed to initialize logging: {e}"))
            );
            None
        },
    };

    for path in &resolved.loaded_files {
        debug!(path = %path.display(), "Config layer loaded");
    }

    let store = config_bridge::build_storage(&resolved.config)?;
    let output = Output::new(cli.pretty);

    let outcome = run(cli.command, store.as_ref(), output).await?;
    Ok(match outcome {
        Outcome::Found => ExitCode::SUCCESS,
        Outcome::Missing => ExitCode::from(1),
    })
}

async fn run(command: Commands, store: &dyn Storage, output: Output) -> Result<Outcome> {
    match command {
        Commands::Keys { namespace } => read::keys(store, &namespace).await,
        Commands::Values { namespace } => read::values(store, &namespace, output).await,
        Commands::List {
            namespace,
            conditions,
        } => read::list(store, &namespace, conditions, output).await,
        Commands::Find {
            namespace,
            conditions,
        } => read::find(store, &namespace, conditions, output).await,
        Commands::Get { namespace, key } => read::get(store, &namespace, &key, output).await,
        Commands::Has { namespace, key } => read::has(store, &namespace, &key, output).await,
        Commands::Set {
            namespace,
            key,
            value,
        } => write::set(store, &namespace, &key, parse_document(&value)?).await,
        Commands::Update {
            namespace,
            key,
            patch,
        } => write::update(store, &namespace, &key, parse_document(&patch)?, output).await,
        Commands::Delete { namespace, key } => write::delete(store, &namespace, &key).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use kvault_storage::MemoryStorage;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kvault", "get", "items", "1", "-vv", "--log-format", "json", "--pretty",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(cli.pretty);
        assert!(matches!(cli.command, Commands::Get { .. }));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        assert!(Cli::try_parse_from(["kvault", "--log-format", "xml", "keys", "items"]).is_err());
    }

    #[test]
    fn test_find_requires_condition() {
        assert!(Cli::try_parse_from(["kvault", "find", "items"]).is_err());
        let cli = Cli::try_parse_from(["kvault", "find", "items", "-w", "status=2"]).unwrap();
        match cli.command {
            Commands::Find { conditions, .. } => assert_eq!(conditions.len(), 1),
            _ => panic!("expected find"),
        }
    }

    #[tokio::test]
    async fn test_run_dispatches() {
        let store = MemoryStorage::new();
        let output = Output::default();

        let set = Commands::Set {
            namespace: "items".to_owned(),
            key: "1".to_owned(),
            value: r#"{"status": 0}"#.to_owned(),
        };
        assert_eq!(run(set, &store, output).await.unwrap(), Outcome::Found);

        let get = Commands::Get {
            namespace: "items".to_owned(),
            key: "2".to_owned(),
        };
        assert_eq!(run(get, &store, output).await.unwrap(), Outcome::Missing);

        let bad = Commands::Set {
            namespace: "items".to_owned(),
            key: "1".to_owned(),
            value: "[]".to_owned(),
        };
        assert!(run(bad, &store, output).await.is_err());
    }
}
