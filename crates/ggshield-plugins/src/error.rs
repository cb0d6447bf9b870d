//! Plugin error types.

use std::path::PathBuf;

use crate::signature::SignatureStatus;

/// Errors from plugin operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The source string uses a scheme or shape that cannot be installed.
    #[error("{0}")]
    InvalidSource(String),

    /// The source uses plain HTTP.
    #[error("HTTP URLs are not allowed for security reasons. Use HTTPS instead.")]
    InsecureSource {
        /// The rejected URL.
        url: String,
    },

    /// The registry does not list a plugin with this name.
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// The registry lists the plugin but the account or platform is not entitled.
    #[error("Plugin '{name}' is not available for your account")]
    NotEntitled {
        /// Plugin name.
        name: String,
        /// Human-readable reason from the catalog.
        reason: Option<String>,
    },

    /// The download endpoint refused the plugin or version (403/404).
    #[error("Plugin '{name}' is not available{}", reason_suffix(.reason))]
    NotAvailable {
        /// Plugin name.
        name: String,
        /// Optional reason.
        reason: Option<String>,
    },

    /// The registry API returned an unexpected response.
    #[error("{0}")]
    Api(String),

    /// Transport-level failure (DNS, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// A download returned a non-success status or could not be written.
    #[error("Download failed: {0}")]
    Download(String),

    /// Downloaded bytes did not hash to the expected SHA-256.
    #[error("Checksum mismatch: expected {}..., got {}...", short_hash(.expected), short_hash(.actual))]
    ChecksumMismatch {
        /// Expected lowercase hex digest.
        expected: String,
        /// Actual lowercase hex digest.
        actual: String,
    },

    /// Signature verification failed under strict mode.
    #[error("{message}")]
    SignatureVerification {
        /// `Missing` or `Invalid`.
        status: SignatureStatus,
        /// Human-readable reason.
        message: String,
    },

    /// The file is not a readable wheel.
    #[error("{0}")]
    InvalidWheel(String),

    /// The wheel has no `*.dist-info/METADATA`.
    #[error("METADATA file not found in wheel: {0}")]
    MetadataNotFound(PathBuf),

    /// Wheel metadata is present but unusable.
    #[error("{0}")]
    Wheel(String),

    /// GitHub Actions artifact download failed.
    #[error("{0}")]
    GitHubArtifact(String),

    /// Plugin name is not safe to use as a directory name.
    #[error("Invalid plugin name: {0:?}")]
    InvalidName(String),

    /// No installed plugin matches this name.
    #[error("Plugin '{0}' is not installed")]
    NotInstalled(String),

    /// Download or archive exceeds the size limit.
    #[error("package too large: {size} bytes (limit: {limit} bytes)")]
    PackageTooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        limit: u64,
    },

    /// Wheel extraction failure.
    #[error("extraction error: {message}")]
    ExtractionError {
        /// Description of the extraction failure.
        message: String,
    },

    /// Path traversal detected in an archive entry.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path.
        path: String,
    },

    /// `manifest.json` could not be read or written.
    #[error("manifest error at {path}: {message}")]
    Manifest {
        /// Path to the manifest.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// The enablement store could not be read or written.
    #[error("config error at {path}: {message}")]
    Config {
        /// Path to the config file.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// A plugin with this name is already registered.
    #[error("plugin already registered: {0}")]
    AlreadyRegistered(String),

    /// A command with this name is already registered.
    #[error("command already registered: {0}")]
    CommandConflict(String),

    /// No constructor is registered for an entry-point symbol.
    #[error("no plugin factory registered for {0}")]
    UnknownSymbol(String),

    /// The plugin requires a newer host.
    #[error("plugin {plugin} requires ggshield >= {required} (running {current})")]
    IncompatibleVersion {
        /// Plugin name.
        plugin: String,
        /// Declared minimum host version.
        required: String,
        /// Running host version.
        current: String,
    },

    /// A plugin failed to load.
    #[error("plugin load failed: {plugin} - {message}")]
    LoadFailed {
        /// The plugin that failed to load.
        plugin: String,
        /// Failure reason.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(16).collect()
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
