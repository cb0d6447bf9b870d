//! ggshield Test - Shared test utilities for the plugin subsystem.
//!
//! Provides an in-memory HTTP transport, a scriptable trust oracle, a wheel
//! builder and an isolated ggshield home, so acquisition, installation and
//! loading can be exercised end to end without a network or a Sigstore trust root.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ggshield_test::{FakeHttp, StaticOracle, TestEnv, WheelBuilder};
//!
//! let env = TestEnv::new()?;
//! let http = FakeHttp::new();
//! let ctx = env.context(&http, Arc::new(StaticOracle::accept()));
//! let wheel = WheelBuilder::new("tokenscanner", "1.0.0").build(&env.scratch()?)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Route `tracing` output to the test harness, once per process.
///
/// Honours `RUST_LOG`; defaults to `debug` for ggshield crates.
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ggshield=debug,ggshield_plugins=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
