//! ggshield Telemetry - Logging setup for the ggshield CLI.
//!
//! Diagnostics always go to stderr so command output on stdout stays clean.
//!
//! # Example
//!
//! ```rust,no_run
//! use ggshield_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), ggshield_telemetry::TelemetryError> {
//! let config = LogConfig::new("warn")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("ggshield_plugins=debug");
//!
//! setup_logging(&config)?;
//! tracing::warn!("plugin directory missing");
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
pub use logging::{LOG_ENV_VAR, LogConfig, LogFormat, setup_logging};
