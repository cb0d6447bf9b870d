//! Update checks and application.
//!
//! Registry-sourced plugins (including legacy manifests without a source) are
//! compared against the catalog. GitHub-release plugins are compared against
//! the repository's latest release. Other sources cannot be checked.

use std::fmt;

use ggshield_core::DottedVersion;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::acquire::{
    Acquirer, GITHUB_API_VERSION, RegistryAcquirer, UrlAcquirer, UrlKind, resolve_github_token,
};
use crate::catalog::{CatalogClient, PluginCatalog};
use crate::context::PluginContext;
use crate::enterprise_config::{EnterpriseConfig, PluginConfig};
use crate::error::{PluginError, PluginResult};
use crate::installer::{InstallOutcome, InstalledPlugin, PluginInstaller};
use crate::manifest::PluginSource;
use crate::signature::SignatureMode;

/// An installed plugin with a newer version available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    /// Enablement key, also used in reports.
    pub name: String,
    /// Registry (manifest) name.
    pub package: String,
    /// Installed version.
    pub current_version: String,
    /// Newer version.
    pub latest_version: String,
    /// Recorded source.
    pub source: PluginSource,
    /// Release asset to download, for GitHub-release sources.
    pub asset_url: Option<String>,
}

impl fmt::Display for AvailableUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.name,
            self.current_version,
            self.latest_version,
            self.source.display_label()
        )
    }
}

/// An installed plugin whose source has no update channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonUpdatable {
    /// Enablement key.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Recorded source.
    pub source: PluginSource,
}

/// Outcome of an update check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Plugins with a newer version.
    pub updates: Vec<AvailableUpdate>,
    /// Plugins that cannot be checked automatically.
    pub non_updatable: Vec<NonUpdatable>,
    /// Plugins already at the latest known version.
    pub up_to_date: Vec<String>,
    /// Plugins for which no version information was available.
    pub unknown: Vec<String>,
}

/// Latest GitHub release with a usable wheel asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Tag without a leading `v`.
    pub version: String,
    /// Asset file name.
    pub asset_name: String,
    /// Asset download URL.
    pub asset_url: String,
}

/// Counts from [`UpdateChecker::apply_updates`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Successful updates.
    pub succeeded: usize,
    /// Failed updates.
    pub failed: usize,
}

/// Installed plugins split by what their enablement records allow.
#[derive(Debug, Clone, Default)]
pub struct UpdateSelection {
    /// Enabled plugins to check.
    pub selected: Vec<InstalledPlugin>,
    /// Plugins with no enabled record.
    pub disabled: Vec<String>,
    /// Enabled plugins left out of a bulk update by `auto_update: false`.
    pub pinned: Vec<String>,
}

/// Keep the plugins an update may touch.
///
/// Only enabled plugins are eligible. When `bulk` is set (`update --all`),
/// records with `auto_update: false` are skipped as well.
#[must_use]
pub fn select_for_update(
    installed: Vec<InstalledPlugin>,
    config: &EnterpriseConfig,
    bulk: bool,
) -> UpdateSelection {
    let mut selection = UpdateSelection::default();
    for plugin in installed {
        let name = plugin.enable_key().to_string();
        match plugin.config_record(config) {
            None | Some(PluginConfig { enabled: false, .. }) => selection.disabled.push(name),
            Some(record) if bulk && !record.auto_update => {
                debug!(plugin = %name, "Auto-update disabled, skipping");
                selection.pinned.push(name);
            },
            Some(_) => selection.selected.push(plugin),
        }
    }
    selection
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    name: String,
    browser_download_url: String,
}

/// Checks installed plugins for updates and applies them.
#[derive(Debug)]
pub struct UpdateChecker<'a> {
    ctx: &'a PluginContext,
}

impl<'a> UpdateChecker<'a> {
    /// Checker using `ctx`.
    #[must_use]
    pub fn new(ctx: &'a PluginContext) -> Self {
        Self { ctx }
    }

    /// Classify `installed` into updates, non-updatable and up-to-date.
    ///
    /// The catalog is fetched once, only when a registry-sourced plugin is
    /// present.
    ///
    /// # Errors
    ///
    /// Returns the catalog error if the catalog is needed and cannot be
    /// fetched. GitHub failures only mark the plugin as unknown.
    pub fn check(&self, installed: &[InstalledPlugin]) -> PluginResult<UpdatePlan> {
        let needs_catalog = installed
            .iter()
            .any(|p| p.manifest.effective_source() == PluginSource::GitGuardianApi);
        let catalog = if needs_catalog {
            Some(CatalogClient::new(self.ctx).fetch_catalog()?)
        } else {
            None
        };

        let mut plan = UpdatePlan::default();
        for plugin in installed {
            self.classify(plugin, catalog.as_ref(), &mut plan);
        }
        Ok(plan)
    }

    fn classify(
        &self,
        plugin: &InstalledPlugin,
        catalog: Option<&PluginCatalog>,
        plan: &mut UpdatePlan,
    ) {
        let name = plugin.enable_key().to_string();
        let current = plugin.manifest.version.clone();
        let source = plugin.manifest.effective_source();

        let latest = match &source {
            PluginSource::GitGuardianApi => catalog
                .and_then(|c| c.find_available(&plugin.manifest.plugin_name))
                .and_then(|entry| entry.latest_version.clone())
                .map(|version| (version, None)),
            PluginSource::GithubRelease {
                github_repo: Some(repo),
                ..
            } => self
                .latest_github_release(repo)
                .map(|release| (release.version, Some(release.asset_url))),
            _ => {
                plan.non_updatable.push(NonUpdatable {
                    name,
                    version: current,
                    source,
                });
                return;
            },
        };

        match latest {
            Some((latest, asset_url)) if DottedVersion::is_upgrade(&current, &latest) => {
                plan.updates.push(AvailableUpdate {
                    name,
                    package: plugin.manifest.plugin_name.clone(),
                    current_version: current,
                    latest_version: latest,
                    source,
                    asset_url,
                });
            },
            Some(_) => plan.up_to_date.push(name),
            None => {
                debug!(plugin = %name, "No version information available");
                plan.unknown.push(name);
            },
        }
    }

    /// Latest release of `owner/repo` with a wheel asset for this platform.
    ///
    /// Prefers a platform-specific wheel, then a `none-any` wheel, then any
    /// wheel. Request failures and non-200 statuses yield `None`.
    #[must_use]
    pub fn latest_github_release(&self, repo: &str) -> Option<ReleaseInfo> {
        let url = format!("{}/repos/{repo}/releases/latest", self.ctx.github_api_url);
        let mut headers = vec![
            ("Accept", "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version", GITHUB_API_VERSION.to_string()),
        ];
        if let Some(token) = resolve_github_token(self.ctx) {
            headers.push(("Authorization", format!("Bearer {token}")));
        }

        let response = match self.ctx.http.get(&url, &headers) {
            Ok(response) => response,
            Err(e) => {
                warn!(repo = %repo, error = %e, "Failed to query latest release");
                return None;
            },
        };
        if response.status != 200 {
            debug!(repo = %repo, status = response.status, "No latest release");
            return None;
        }
        let release: RawRelease = match response.json() {
            Ok(release) => release,
            Err(e) => {
                warn!(repo = %repo, error = %e, "Malformed release response");
                return None;
            },
        };

        let wheels: Vec<&RawAsset> = release
            .assets
            .iter()
            .filter(|a| a.name.ends_with(".whl"))
            .collect();
        let asset = wheels
            .iter()
            .find(|a| self.ctx.platform.matches_wheel(&a.name))
            .or_else(|| wheels.iter().find(|a| a.name.contains("none-any")))
            .or_else(|| wheels.first())?;

        let version = release
            .tag_name
            .strip_prefix('v')
            .unwrap_or(&release.tag_name)
            .to_string();
        Some(ReleaseInfo {
            version,
            asset_name: asset.name.clone(),
            asset_url: asset.browser_download_url.clone(),
        })
    }

    /// Re-acquire and reinstall one plugin at its newer version.
    ///
    /// # Errors
    ///
    /// Propagates acquisition and installation failures.
    pub fn apply(
        &self,
        update: &AvailableUpdate,
        mode: SignatureMode,
    ) -> PluginResult<InstallOutcome> {
        let package = match &update.source {
            PluginSource::GitGuardianApi => RegistryAcquirer::new(
                self.ctx,
                update.package.clone(),
                Some(update.latest_version.clone()),
            )
            .acquire()?,
            PluginSource::GithubRelease { github_repo, .. } => {
                let url = update.asset_url.clone().ok_or_else(|| {
                    PluginError::Download(format!("No release asset for {}", update.name))
                })?;
                UrlAcquirer::new(
                    self.ctx,
                    url,
                    UrlKind::GitHubRelease {
                        repo: github_repo.clone(),
                    },
                    None,
                )
                .acquire()?
            },
            other => {
                return Err(PluginError::InvalidSource(format!(
                    "{} installs cannot be updated automatically",
                    other.display_label()
                )));
            },
        };
        PluginInstaller::from_context(self.ctx).install(&package, mode)
    }

    /// Apply each update, continuing past failures. Successful updates
    /// record their new version in `config` without touching `enabled` or
    /// `auto_update`; `report` sees every result.
    pub fn apply_updates(
        &self,
        updates: &[AvailableUpdate],
        mode: SignatureMode,
        config: &mut EnterpriseConfig,
        mut report: impl FnMut(&AvailableUpdate, &PluginResult<InstallOutcome>),
    ) -> UpdateSummary {
        let mut summary = UpdateSummary::default();
        for update in updates {
            let result = self.apply(update, mode);
            match &result {
                Ok(outcome) => {
                    config.record_version(&update.name, &outcome.version);
                    info!(plugin = %update.name, version = %outcome.version, "Updated plugin");
                    summary.succeeded = summary.succeeded.saturating_add(1);
                },
                Err(e) => {
                    warn!(plugin = %update.name, error = %e, "Update failed");
                    summary.failed = summary.failed.saturating_add(1);
                },
            }
            report(update, &result);
        }
        summary
    }
}
