//! Directory resolution for ggshield configuration and plugin state.
//!
//! # Layout
//!
//! ```text
//! <config dir>/                     (~/.config/ggshield or $GGSHIELD_HOME)
//! └── enterprise_config.yaml          (plugin enablement + signature mode)
//!
//! <data dir>/                       (~/.local/share/ggshield or $GGSHIELD_HOME)
//! └── plugins/
//!     └── <plugin>/
//!         ├── manifest.json
//!         ├── <wheel>.whl
//!         ├── <wheel>.whl.sigstore
//!         └── .<wheel stem>_extracted/
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Environment variable overriding both the config and data directories.
pub const HOME_ENV_VAR: &str = "GGSHIELD_HOME";

/// File name of the enablement store inside the config directory.
pub const ENTERPRISE_CONFIG_FILE: &str = "enterprise_config.yaml";

/// Errors resolving ggshield directories.
#[derive(Debug, thiserror::Error)]
pub enum DirsError {
    /// `$GGSHIELD_HOME` is set to a relative path.
    #[error("{HOME_ENV_VAR} must be an absolute path, got: {0}")]
    RelativeHome(String),

    /// No home directory could be determined for the current user.
    #[error("could not determine a home directory; set {HOME_ENV_VAR}")]
    NoHomeDirectory,
}

/// Resolved ggshield directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgshieldDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl GgshieldDirs {
    /// Resolve the directories for the current user.
    ///
    /// Checks `$GGSHIELD_HOME` first (used for both config and data), then
    /// falls back to the platform's per-user config and data directories.
    ///
    /// # Errors
    ///
    /// Returns an error if `$GGSHIELD_HOME` is relative or no home directory
    /// exists.
    pub fn resolve() -> Result<Self, DirsError> {
        if let Some(custom) = std::env::var_os(HOME_ENV_VAR) {
            let root = PathBuf::from(&custom);
            if !root.is_absolute() {
                return Err(DirsError::RelativeHome(root.display().to_string()));
            }
            return Ok(Self::from_path(root));
        }

        let project = ProjectDirs::from("", "", "ggshield").ok_or(DirsError::NoHomeDirectory)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
            data_dir: project.data_dir().to_path_buf(),
        })
    }

    /// Use a single explicit root for config and data (tests, `$GGSHIELD_HOME`).
    #[must_use]
    pub fn from_path(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.clone(),
            data_dir: root,
        }
    }

    /// Configuration directory.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Installed plugins directory (`<data dir>/plugins/`).
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.data_dir.join("plugins")
    }

    /// Path of the enablement store (`<config dir>/enterprise_config.yaml`).
    #[must_use]
    pub fn enterprise_config_path(&self) -> PathBuf {
        self.config_dir.join(ENTERPRISE_CONFIG_FILE)
    }

    /// Create the plugins directory if needed and return it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn ensure_plugins_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.plugins_dir();
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_shares_root() {
        let dirs = GgshieldDirs::from_path("/tmp/gg");
        assert_eq!(dirs.config_dir(), Path::new("/tmp/gg"));
        assert_eq!(dirs.plugins_dir(), PathBuf::from("/tmp/gg/plugins"));
        assert_eq!(
            dirs.enterprise_config_path(),
            PathBuf::from("/tmp/gg/enterprise_config.yaml")
        );
    }

    #[test]
    fn ensure_plugins_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = GgshieldDirs::from_path(tmp.path());
        let created = dirs.ensure_plugins_dir().unwrap();
        assert!(created.is_dir());
        assert_eq!(created, tmp.path().join("plugins"));
    }
}
