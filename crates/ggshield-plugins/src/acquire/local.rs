//! Local wheel acquisition.

use std::path::PathBuf;

use super::{AcquiredPackage, Acquirer, ensure_checksum, sha256_file};
use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginSource;
use crate::signature::find_bundle;

/// Uses a wheel already on disk. Nothing is staged; a bundle next to the
/// wheel travels with it.
#[derive(Debug)]
pub struct LocalAcquirer {
    path: PathBuf,
    expected_sha256: Option<String>,
}

impl LocalAcquirer {
    /// Acquirer for the wheel at `path`.
    #[must_use]
    pub fn new(path: PathBuf, expected_sha256: Option<String>) -> Self {
        Self {
            path,
            expected_sha256: expected_sha256.filter(|s| !s.trim().is_empty()),
        }
    }
}

impl Acquirer for LocalAcquirer {
    fn acquire(&self) -> PluginResult<AcquiredPackage> {
        if !self.path.is_file() {
            return Err(PluginError::InvalidWheel(format!(
                "Wheel file not found: {}",
                self.path.display()
            )));
        }
        if self.path.extension().is_none_or(|ext| ext != "whl") {
            return Err(PluginError::InvalidWheel(format!(
                "Not a wheel file: {}",
                self.path.display()
            )));
        }

        let wheel_path = self.path.canonicalize()?;
        let wheel_filename = wheel_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| PluginError::InvalidWheel(format!("Not a wheel file: {}", self.path.display())))?;

        let sha256 = sha256_file(&wheel_path)?;
        if let Some(expected) = &self.expected_sha256 {
            ensure_checksum(expected, &sha256)?;
        }

        Ok(AcquiredPackage {
            staging: None,
            bundle_path: find_bundle(&wheel_path),
            source: PluginSource::LocalFile {
                local_path: wheel_path.display().to_string(),
                sha256: Some(sha256.clone()),
            },
            wheel_path,
            wheel_filename,
            sha256,
            expected_sha256: self.expected_sha256.clone(),
            name: None,
            version: None,
        })
    }
}
