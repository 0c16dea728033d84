//! Logging setup for Keel binaries.
//!
//! Library crates in the workspace emit `tracing` events and never install a
//! subscriber. Binaries call [`init_logging`] once at startup:
//!
//! ```rust,ignore
//! use keel_telemetry::{init_logging, LogConfig, LogFormat};
//!
//! let config = LogConfig::default()
//!     .with_level("info")
//!     .with_format(LogFormat::Pretty);
//! init_logging(&config)?;
//! ```
//!
//! A `RUST_LOG` directive in the environment overrides the configured level
//! unless [`LogConfig::env_override`] is disabled.

#![warn(missing_docs)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
