//! Enablement store (`enterprise_config.yaml`).
//!
//! ```yaml
//! plugins:
//!   tokenscanner:
//!     enabled: true
//!     version: 1.0.0
//!     auto_update: true
//!   legacy-plugin: false   # shorthand for {enabled: false}
//! plugin_signature_mode: strict
//! ```
//!
//! Records are independent of installed manifests: a plugin can be disabled
//! but installed, or enabled before anything is on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PluginError, PluginResult};
use crate::signature::SignatureMode;

/// Per-plugin enablement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Whether the loader should load the plugin.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Version pinned at install time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Whether `plugin update --all` may touch it.
    #[serde(default = "default_true")]
    pub auto_update: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version: None,
            auto_update: true,
        }
    }
}

/// On-disk shape of a record: a table, a bare bool, or anything else.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPluginConfig {
    Flag(bool),
    Table(PluginConfig),
    Other(serde_yaml::Value),
}

impl From<RawPluginConfig> for PluginConfig {
    fn from(raw: RawPluginConfig) -> Self {
        match raw {
            RawPluginConfig::Flag(enabled) => Self {
                enabled,
                ..Self::default()
            },
            RawPluginConfig::Table(config) => config,
            RawPluginConfig::Other(_) => Self::default(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawEnterpriseConfig {
    #[serde(default)]
    plugins: Option<BTreeMap<String, RawPluginConfig>>,
    #[serde(default)]
    plugin_signature_mode: Option<String>,
}

/// Plugin enablement and signature policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnterpriseConfig {
    /// Records keyed by plugin name.
    pub plugins: BTreeMap<String, PluginConfig>,
    /// Raw signature mode; see [`EnterpriseConfig::signature_mode`].
    pub plugin_signature_mode: String,
}

impl Default for EnterpriseConfig {
    fn default() -> Self {
        Self {
            plugins: BTreeMap::new(),
            plugin_signature_mode: SignatureMode::Strict.as_str().to_string(),
        }
    }
}

impl EnterpriseConfig {
    /// Parse YAML content. Empty content yields the default.
    ///
    /// # Errors
    ///
    /// Returns the YAML error message when the document is malformed.
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: Option<RawEnterpriseConfig> =
            serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let raw = raw.unwrap_or_default();

        Ok(Self {
            plugins: raw
                .plugins
                .unwrap_or_default()
                .into_iter()
                .map(|(name, cfg)| (name, cfg.into()))
                .collect(),
            plugin_signature_mode: raw
                .plugin_signature_mode
                .unwrap_or_else(|| SignatureMode::Strict.as_str().to_string()),
        })
    }

    /// Load from `path`, returning the default if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] if the file exists but cannot be read
    /// or parsed.
    pub fn load_or_default(path: &Path) -> PluginResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content).map_err(|message| PluginError::Config {
                path: path.to_path_buf(),
                message: format!("failed to parse: {message}"),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(PluginError::Config {
                path: path.to_path_buf(),
                message: format!("failed to read: {e}"),
            }),
        }
    }

    /// Write to `path` atomically, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Config`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> PluginResult<()> {
        let err = |message: String| PluginError::Config {
            path: path.to_path_buf(),
            message,
        };

        let parent = path
            .parent()
            .ok_or_else(|| err("config path has no parent directory".to_string()))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| err(format!("failed to create config directory: {e}")))?;

        let body =
            serde_yaml::to_string(self).map_err(|e| err(format!("failed to serialize: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| err(format!("failed to create temp file for atomic write: {e}")))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| err(format!("failed to write temp config: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| err(format!("failed to sync temp config to disk: {e}")))?;
        tmp.persist(path)
            .map_err(|e| err(format!("failed to persist config: {e}")))?;
        Ok(())
    }

    /// Load, apply `f`, save. Returns `f`'s result.
    ///
    /// # Errors
    ///
    /// Propagates load and save failures.
    pub fn update<T>(path: &Path, f: impl FnOnce(&mut Self) -> T) -> PluginResult<T> {
        let mut config = Self::load_or_default(path)?;
        let out = f(&mut config);
        config.save(path)?;
        Ok(out)
    }

    /// Parsed signature mode. An unrecognised value falls back to strict.
    #[must_use]
    pub fn signature_mode(&self) -> SignatureMode {
        self.plugin_signature_mode.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to strict signature mode");
            SignatureMode::Strict
        })
    }

    /// Enable `name`, recording `version` when given.
    pub fn enable_plugin(&mut self, name: &str, version: Option<&str>) {
        let record = self.plugins.entry(name.to_string()).or_default();
        record.enabled = true;
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            record.version = Some(version.to_string());
        }
    }

    /// Record that `name` now runs `version`, leaving `enabled` and
    /// `auto_update` untouched. Creates an enabled record if none exists.
    pub fn record_version(&mut self, name: &str, version: &str) {
        let record = self.plugins.entry(name.to_string()).or_default();
        if !version.is_empty() {
            record.version = Some(version.to_string());
        }
    }

    /// Disable `name`, creating a record if needed.
    pub fn disable_plugin(&mut self, name: &str) {
        self.plugins.entry(name.to_string()).or_default().enabled = false;
    }

    /// Whether `name` is enabled. Unconfigured plugins count as enabled here;
    /// the loader additionally requires a record.
    #[must_use]
    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.plugins.get(name).is_none_or(|cfg| cfg.enabled)
    }

    /// Record for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PluginConfig> {
        self.plugins.get(name)
    }

    /// Pinned version of `name`.
    #[must_use]
    pub fn get_plugin_version(&self, name: &str) -> Option<&str> {
        self.plugins.get(name).and_then(|cfg| cfg.version.as_deref())
    }

    /// Drop the record for `name`. Returns whether one existed.
    pub fn remove_plugin(&mut self, name: &str) -> bool {
        self.plugins.remove(name).is_some()
    }
}
