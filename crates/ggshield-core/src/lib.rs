//! ggshield Core - Foundation types shared by the ggshield crates.
//!
//! This crate provides:
//! - Directory resolution for configuration and installed plugins
//! - Loose dotted version parsing and ordering
//! - Detection of the host platform triple used by the plugin registry

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod dirs;
pub mod platform;
pub mod version;

pub use dirs::{DirsError, GgshieldDirs};
pub use platform::PlatformInfo;
pub use version::{DottedVersion, VersionParseError, host_version};
