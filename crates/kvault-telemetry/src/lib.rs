//! Kvault Telemetry - logging setup for kvault binaries.
//!
//! This crate provides:
//! - A serializable [`LogConfig`] (level, format, target, directives)
//! - [`setup_logging`], which installs a global `tracing` subscriber
//!
//! # Example
//!
//! ```rust,no_run
//! use kvault_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), kvault_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("kvault_storage=debug");
//!
//! // Keep the guard alive for the life of the program.
//! let _guard = setup_logging(&config)?;
//! tracing::info!("ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, LoggingGuard,
    setup_default_logging, setup_logging,
};
