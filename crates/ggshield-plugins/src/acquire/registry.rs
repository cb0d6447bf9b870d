//! Registry acquisition: catalog check, download info, download, checksum.

use tracing::{info, warn};

use super::{AcquiredPackage, Acquirer, download_to, ensure_checksum, is_safe_file_name, staging_dir};
use crate::catalog::CatalogClient;
use crate::context::PluginContext;
use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginSource;

/// Acquires a plugin by name from the GitGuardian registry.
#[derive(Debug)]
pub struct RegistryAcquirer<'a> {
    ctx: &'a PluginContext,
    name: String,
    version: Option<String>,
}

impl<'a> RegistryAcquirer<'a> {
    /// Acquirer for `name`, optionally pinned to `version`.
    #[must_use]
    pub fn new(ctx: &'a PluginContext, name: String, version: Option<String>) -> Self {
        Self { ctx, name, version }
    }
}

impl Acquirer for RegistryAcquirer<'_> {
    fn acquire(&self) -> PluginResult<AcquiredPackage> {
        let client = CatalogClient::new(self.ctx);
        let catalog = client.fetch_catalog()?;

        let entry = catalog
            .find(&self.name)
            .ok_or_else(|| PluginError::UnknownPlugin(self.name.clone()))?;
        if !entry.available {
            return Err(PluginError::NotEntitled {
                name: self.name.clone(),
                reason: entry.reason.clone(),
            });
        }

        let download = client.download_info(&self.name, self.version.as_deref())?;
        if !is_safe_file_name(&download.filename) {
            return Err(PluginError::Api(format!(
                "Registry returned an invalid file name: {:?}",
                download.filename
            )));
        }

        let staging = staging_dir()?;
        let (wheel_path, sha256) = download_to(
            self.ctx.http.as_ref(),
            &download.download_url,
            &[],
            staging.path(),
            &download.filename,
        )?;
        ensure_checksum(&download.sha256, &sha256)?;

        let bundle_path = download.signature_url.as_deref().and_then(|url| {
            let bundle_name = format!("{}.sigstore", download.filename);
            match download_to(self.ctx.http.as_ref(), url, &[], staging.path(), &bundle_name) {
                Ok((path, _)) => Some(path),
                Err(e) => {
                    warn!(plugin = %self.name, error = %e, "Failed to download signature bundle");
                    None
                },
            }
        });

        info!(plugin = %self.name, version = %download.version, "Acquired plugin from registry");

        Ok(AcquiredPackage {
            staging: Some(staging),
            wheel_path,
            wheel_filename: download.filename,
            sha256,
            expected_sha256: Some(download.sha256),
            bundle_path,
            name: Some(self.name.clone()),
            version: Some(download.version),
            source: PluginSource::GitGuardianApi,
        })
    }
}
