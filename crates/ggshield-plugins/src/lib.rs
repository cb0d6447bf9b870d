//! Plugin distribution and trust for ggshield.
//!
//! Takes a plugin from wherever it is published to a loaded, registered
//! extension of the CLI:
//!
//! - [`catalog`]: the GitGuardian plugin catalog and download-info API
//! - [`source`]: classification of user-supplied install sources
//! - [`acquire`]: per-source download and staging, with checksum gating
//! - [`signature`]: Sigstore bundle discovery and verification policy
//! - [`installer`]: atomic installation under `plugins/<name>/`
//! - [`enterprise_config`]: persisted enablement records and signature mode
//! - [`loader`]: discovery of bundled and installed plugins, compatibility
//!   checks and loading into a [`PluginRegistry`]
//! - [`update`]: update detection and application across sources
//!
//! # Trust model
//!
//! Nothing reaches the plugins directory before its SHA-256 (when one is
//! known) has been checked. Signature verification runs at install time and
//! again at load time; in `strict` mode an unverified wheel is never
//! installed or executed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod acquire;
pub mod catalog;
pub mod context;
pub mod enterprise_config;
pub mod error;
pub mod http;
pub mod installer;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod signature;
pub mod source;
pub mod update;
pub mod wheel;

mod process;

pub use acquire::{AcquireOptions, AcquiredPackage, Acquirer, acquirer_for};
pub use catalog::{CatalogClient, PluginCatalog, PluginDownloadInfo, PluginInfo};
pub use context::PluginContext;
pub use enterprise_config::{EnterpriseConfig, PluginConfig};
pub use error::{PluginError, PluginResult};
pub use http::{BlockingHttp, HttpClient, HttpResponse};
pub use installer::{InstallOutcome, InstalledPlugin, PluginInstaller};
pub use loader::{DiscoveredPlugin, PluginLoader, PluginOrigin, is_version_compatible};
pub use manifest::{PluginManifest, PluginSource};
pub use plugin::{EntryPoint, FactoryTable, GgshieldPlugin, PluginFactory, PluginMetadata};
pub use registry::{PluginCommand, PluginRegistry};
pub use signature::{
    SignatureInfo, SignatureMode, SignatureStatus, SignatureVerifier, SigstoreOracle,
    TrustOracle, TrustedIdentity,
};
pub use source::{ResolvedSource, resolve_source};
pub use update::{
    AvailableUpdate, UpdateChecker, UpdatePlan, UpdateSelection, UpdateSummary, select_for_update,
};
