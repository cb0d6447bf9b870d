//! Installed-plugin manifest (`manifest.json`).
//!
//! One manifest per plugin directory records which wheel is installed, its
//! checksum, where it came from and how its signature verified.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};
use crate::signature::SignatureInfo;

/// File name of the manifest inside a plugin directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Where an installed plugin came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginSource {
    /// The GitGuardian plugin registry. `registry_api` is read as a synonym.
    #[serde(rename = "gitguardian_api", alias = "registry_api")]
    GitGuardianApi,
    /// A wheel on the local filesystem.
    LocalFile {
        /// Absolute path of the source wheel.
        local_path: String,
        /// SHA-256 of the installed wheel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    /// An arbitrary HTTPS URL.
    Url {
        /// Download URL.
        url: String,
        /// SHA-256 of the installed wheel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    /// A GitHub release asset.
    GithubRelease {
        /// Asset URL.
        url: String,
        /// `owner/repo`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        github_repo: Option<String>,
        /// SHA-256 of the installed wheel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    /// A GitHub Actions artifact.
    GithubArtifact {
        /// Artifact page URL.
        url: String,
        /// `owner/repo`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        github_repo: Option<String>,
        /// SHA-256 of the installed wheel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    /// A `type` this version does not recognise. Treated as a registry
    /// install so the plugin stays listable and removable.
    #[serde(other)]
    Unknown,
}

impl PluginSource {
    /// Serialized `type` tag.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::GitGuardianApi => "gitguardian_api",
            Self::LocalFile { .. } => "local_file",
            Self::Url { .. } => "url",
            Self::GithubRelease { .. } => "github_release",
            Self::GithubArtifact { .. } => "github_artifact",
            Self::Unknown => "unknown",
        }
    }

    /// Whether update checks can be automated for this source.
    #[must_use]
    pub fn is_auto_updatable(&self) -> bool {
        matches!(
            self,
            Self::GitGuardianApi | Self::GithubRelease { .. } | Self::Unknown
        )
    }

    /// Human-readable origin used in update reports.
    #[must_use]
    pub fn display_label(&self) -> String {
        match self {
            Self::GitGuardianApi | Self::Unknown => "GitGuardian".to_string(),
            Self::GithubRelease {
                github_repo: Some(repo),
                ..
            } => format!("GitHub: {repo}"),
            Self::GithubRelease { .. } => "GitHub release".to_string(),
            Self::GithubArtifact { .. } => "GitHub artifact".to_string(),
            Self::Url { .. } => "URL".to_string(),
            Self::LocalFile { .. } => "local file".to_string(),
        }
    }
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Distribution (or registry) name; also the plugin directory name.
    pub plugin_name: String,
    /// Installed version, as declared by the wheel or registry.
    pub version: String,
    /// File name of the installed wheel inside the plugin directory.
    pub wheel_filename: String,
    /// Lowercase hex SHA-256 of the installed wheel.
    pub sha256: String,
    /// Origin. Absent in manifests written before source tracking existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PluginSource>,
    /// Install time (UTC). Missing values read as the Unix epoch.
    #[serde(default)]
    pub installed_at: DateTime<Utc>,
    /// Signature verification result at install time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureInfo>,
}

impl PluginManifest {
    /// Effective source. Legacy manifests without one, and manifests with
    /// an unrecognised source type, are registry installs.
    #[must_use]
    pub fn effective_source(&self) -> PluginSource {
        match &self.source {
            None | Some(PluginSource::Unknown) => PluginSource::GitGuardianApi,
            Some(source) => source.clone(),
        }
    }

    /// Signature label for listings, if a result was recorded.
    #[must_use]
    pub fn signature_label(&self) -> Option<String> {
        self.signature.as_ref().map(SignatureInfo::label)
    }

    /// Path of the installed wheel given its plugin directory.
    #[must_use]
    pub fn wheel_path(&self, plugin_dir: &Path) -> PathBuf {
        plugin_dir.join(&self.wheel_filename)
    }

    /// Load `manifest.json` from a plugin directory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if the file cannot be read or parsed.
    pub fn load(plugin_dir: &Path) -> PluginResult<Self> {
        let path = plugin_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| PluginError::Manifest {
            path: path.clone(),
            message: format!("failed to read manifest: {e}"),
        })?;
        serde_json::from_str(&content).map_err(|e| PluginError::Manifest {
            path,
            message: format!("failed to parse manifest: {e}"),
        })
    }

    /// Write `manifest.json` atomically into `plugin_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if serialization or the write fails.
    pub fn save(&self, plugin_dir: &Path) -> PluginResult<()> {
        let path = plugin_dir.join(MANIFEST_FILE);
        let err = |message: String| PluginError::Manifest {
            path: path.clone(),
            message,
        };

        let body = serde_json::to_string_pretty(self)
            .map_err(|e| err(format!("failed to serialize manifest: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(plugin_dir)
            .map_err(|e| err(format!("failed to create temp file for atomic write: {e}")))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| err(format!("failed to write temp manifest: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| err(format!("failed to sync temp manifest to disk: {e}")))?;
        tmp.persist(&path)
            .map_err(|e| err(format!("failed to persist manifest: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureStatus;

    fn sample() -> PluginManifest {
        PluginManifest {
            plugin_name: "tokenscanner".into(),
            version: "1.0.0".into(),
            wheel_filename: "tokenscanner-1.0.0-py3-none-any.whl".into(),
            sha256: "ab".repeat(32),
            source: Some(PluginSource::GithubRelease {
                url: "https://github.com/acme/ts/releases/download/v1.0.0/t.whl".into(),
                github_repo: Some("acme/ts".into()),
                sha256: None,
            }),
            installed_at: Utc::now(),
            signature: Some(SignatureInfo {
                status: SignatureStatus::Valid,
                identity: Some("GitGuardian/satori".into()),
                message: None,
            }),
        }
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = sample();
        manifest.save(tmp.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(raw["source"]["type"], "github_release");
        assert_eq!(raw["source"]["github_repo"], "acme/ts");
        assert_eq!(raw["signature"]["status"], "valid");

        assert_eq!(PluginManifest::load(tmp.path()).unwrap(), manifest);
    }

    #[test]
    fn registry_source_tag() {
        let json = serde_json::to_value(PluginSource::GitGuardianApi).unwrap();
        assert_eq!(json, serde_json::json!({"type": "gitguardian_api"}));
    }

    #[test]
    fn legacy_manifest_is_registry_sourced() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{
                "plugin_name": "tokenscanner",
                "version": "0.9.0",
                "wheel_filename": "tokenscanner-0.9.0-py3-none-any.whl",
                "sha256": "00",
                "installed_at": "2024-05-01T10:00:00+00:00"
            }"#,
        )
        .unwrap();
        let manifest = PluginManifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.source, None);
        assert_eq!(manifest.effective_source(), PluginSource::GitGuardianApi);
        assert!(manifest.effective_source().is_auto_updatable());
        assert_eq!(manifest.signature_label(), None);
    }

    fn write_manifest_with_source(dir: &Path, source: &str) {
        std::fs::write(
            dir.join(MANIFEST_FILE),
            format!(
                r#"{{
                    "plugin_name": "tokenscanner",
                    "version": "1.0.0",
                    "wheel_filename": "tokenscanner-1.0.0-py3-none-any.whl",
                    "sha256": "00",
                    "source": {source}
                }}"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn registry_api_tag_reads_as_registry() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest_with_source(tmp.path(), r#"{"type": "registry_api"}"#);
        let manifest = PluginManifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.source, Some(PluginSource::GitGuardianApi));
        assert_eq!(manifest.installed_at, DateTime::<Utc>::default());
    }

    #[test]
    fn unknown_source_type_is_registry_sourced() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest_with_source(
            tmp.path(),
            r#"{"type": "some_future_source", "mirror": "https://mirror.test"}"#,
        );
        let manifest = PluginManifest::load(tmp.path()).unwrap();
        assert_eq!(manifest.source, Some(PluginSource::Unknown));
        assert_eq!(manifest.effective_source(), PluginSource::GitGuardianApi);
        assert_eq!(manifest.effective_source().display_label(), "GitGuardian");
    }

    #[test]
    fn auto_update_support() {
        assert!(!PluginSource::Url {
            url: "https://x".into(),
            sha256: None
        }
        .is_auto_updatable());
        assert!(!PluginSource::LocalFile {
            local_path: "/x.whl".into(),
            sha256: None
        }
        .is_auto_updatable());
        assert!(!PluginSource::GithubArtifact {
            url: "https://x".into(),
            github_repo: None,
            sha256: None
        }
        .is_auto_updatable());
    }

    #[test]
    fn corrupt_manifest_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert!(matches!(
            PluginManifest::load(tmp.path()),
            Err(PluginError::Manifest { .. })
        ));
    }
}
