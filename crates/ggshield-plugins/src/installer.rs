//! Installation into `{plugins_dir}/{name}/` and installed-plugin queries.
//!
//! Install order is chosen so the visible `(wheel, manifest.json)` pair is
//! always either the previous good install or the new one:
//!
//! 1. copy the staged wheel to `{file}.tmp`, re-hashing it
//! 2. stage the bundle as `{file}{suffix}.tmp`
//! 3. verify the signature against the staged files
//! 4. move the current wheel and bundles aside to `.bak`
//! 5. rename the staged files into place
//! 6. write the manifest atomically
//!
//! A failure after step 4 restores the `.bak` files.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::acquire::{AcquiredPackage, HashingWriter, is_safe_file_name};
use crate::context::PluginContext;
use crate::enterprise_config::{EnterpriseConfig, PluginConfig};
use crate::error::{PluginError, PluginResult};
use crate::manifest::{MANIFEST_FILE, PluginManifest, PluginSource};
use crate::signature::{BUNDLE_SUFFIXES, SignatureMode, SignatureVerifier};
use crate::wheel::{EntryPointSpec, read_entry_point, read_wheel_metadata};

/// Reject names that are not a single safe path component.
///
/// # Errors
///
/// Returns [`PluginError::InvalidName`].
pub fn validate_plugin_name(name: &str) -> PluginResult<()> {
    if is_safe_file_name(name) {
        Ok(())
    } else {
        Err(PluginError::InvalidName(name.to_string()))
    }
}

/// Result of a successful install.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Plugin directory name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Installed wheel.
    pub wheel_path: PathBuf,
    /// Written manifest.
    pub manifest: PluginManifest,
    /// Name under which the plugin should be enabled: the registry name for
    /// registry installs, otherwise the wheel's entry-point name when it
    /// declares one.
    pub enable_key: String,
}

/// A plugin directory with a readable manifest.
#[derive(Debug, Clone)]
pub struct InstalledPlugin {
    /// Plugin directory.
    pub dir: PathBuf,
    /// Its manifest.
    pub manifest: PluginManifest,
    /// Entry point declared by the installed wheel.
    pub entry_point: Option<EntryPointSpec>,
}

impl InstalledPlugin {
    /// Entry-point name when declared, otherwise the manifest name.
    #[must_use]
    pub fn key(&self) -> &str {
        self.entry_point
            .as_ref()
            .map_or(self.manifest.plugin_name.as_str(), |ep| ep.name.as_str())
    }

    /// Name of the plugin's enablement record: the manifest name for
    /// registry installs, otherwise [`InstalledPlugin::key`].
    #[must_use]
    pub fn enable_key(&self) -> &str {
        match self.manifest.effective_source() {
            PluginSource::GitGuardianApi => &self.manifest.plugin_name,
            _ => self.key(),
        }
    }

    /// Enablement record for this plugin, looked up by
    /// [`InstalledPlugin::enable_key`] then [`InstalledPlugin::key`].
    #[must_use]
    pub fn config_record<'c>(&self, config: &'c EnterpriseConfig) -> Option<&'c PluginConfig> {
        config
            .get(self.enable_key())
            .or_else(|| config.get(self.key()))
    }

    /// Installed wheel path.
    #[must_use]
    pub fn wheel_path(&self) -> PathBuf {
        self.manifest.wheel_path(&self.dir)
    }

    /// Whether `name` refers to this plugin by package or entry-point name.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.manifest.plugin_name == name
            || self.entry_point.as_ref().is_some_and(|ep| ep.name == name)
    }
}

/// Name of the extraction directory for a wheel file name.
#[must_use]
pub fn extracted_dir_name(wheel_filename: &str) -> String {
    let stem = wheel_filename.strip_suffix(".whl").unwrap_or(wheel_filename);
    format!(".{stem}_extracted")
}

/// Installs acquired packages and answers queries about installed ones.
#[derive(Debug, Clone)]
pub struct PluginInstaller {
    plugins_dir: PathBuf,
    verifier: Arc<SignatureVerifier>,
}

impl PluginInstaller {
    /// Installer rooted at `plugins_dir`.
    #[must_use]
    pub fn new(plugins_dir: impl Into<PathBuf>, verifier: Arc<SignatureVerifier>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            verifier,
        }
    }

    /// Installer using `ctx`'s plugins directory and verifier.
    #[must_use]
    pub fn from_context(ctx: &PluginContext) -> Self {
        Self::new(ctx.dirs.plugins_dir(), Arc::clone(&ctx.verifier))
    }

    /// Root plugins directory.
    #[must_use]
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Install `package`, verifying its signature under `mode`.
    ///
    /// # Errors
    ///
    /// - [`PluginError::InvalidWheel`] / [`PluginError::MetadataNotFound`] /
    ///   [`PluginError::Wheel`] if the wheel metadata cannot be read
    /// - [`PluginError::InvalidName`] for unsafe plugin or file names
    /// - [`PluginError::ChecksumMismatch`] if the bytes changed since
    ///   acquisition
    /// - [`PluginError::SignatureVerification`] in strict mode
    /// - [`PluginError::Io`] / [`PluginError::Manifest`] on write failures
    pub fn install(
        &self,
        package: &AcquiredPackage,
        mode: SignatureMode,
    ) -> PluginResult<InstallOutcome> {
        let metadata = read_wheel_metadata(&package.wheel_path)?;
        let name = package.name.clone().unwrap_or(metadata.name);
        let version = package.version.clone().unwrap_or(metadata.version);
        validate_plugin_name(&name)?;
        validate_plugin_name(&package.wheel_filename)?;

        let plugin_dir = self.plugins_dir.join(&name);
        let created = !plugin_dir.exists();
        fs::create_dir_all(&plugin_dir)?;

        let previous = PluginManifest::load(&plugin_dir).ok();

        let result = self.install_into(&plugin_dir, &name, &version, package, mode);
        if result.is_err() && created {
            let _ = fs::remove_dir_all(&plugin_dir);
        }
        let manifest = result?;

        if let Some(previous) = previous
            && previous.wheel_filename != manifest.wheel_filename
        {
            remove_wheel_files(&plugin_dir, &previous.wheel_filename);
        }

        let wheel_path = manifest.wheel_path(&plugin_dir);
        let enable_key = match manifest.effective_source() {
            PluginSource::GitGuardianApi => name.clone(),
            _ => read_entry_point(&wheel_path).map_or_else(|| name.clone(), |ep| ep.name),
        };

        info!(plugin = %name, version = %version, "Installed plugin");

        Ok(InstallOutcome {
            name,
            version,
            wheel_path,
            manifest,
            enable_key,
        })
    }

    fn install_into(
        &self,
        plugin_dir: &Path,
        name: &str,
        version: &str,
        package: &AcquiredPackage,
        mode: SignatureMode,
    ) -> PluginResult<PluginManifest> {
        let filename = package.wheel_filename.as_str();
        let final_wheel = plugin_dir.join(filename);
        let tmp_wheel = plugin_dir.join(format!("{filename}.tmp"));

        let bundle = package.bundle_path.as_deref().map(|src| {
            let suffix = bundle_suffix(src);
            (
                src,
                plugin_dir.join(format!("{filename}{suffix}.tmp")),
                plugin_dir.join(format!("{filename}{suffix}")),
            )
        });

        let mut staged = vec![tmp_wheel.clone()];
        let staged_result = (|| -> PluginResult<_> {
            let sha256 = copy_hashed(&package.wheel_path, &tmp_wheel)?;
            if !crate::acquire::checksums_match(&package.sha256, &sha256) {
                return Err(PluginError::ChecksumMismatch {
                    expected: package.sha256.clone(),
                    actual: sha256,
                });
            }

            if let Some((src, tmp, _)) = &bundle {
                staged.push(tmp.clone());
                fs::copy(src, tmp)?;
            }

            let signature = self.verifier.verify(
                &tmp_wheel,
                bundle.as_ref().map(|(_, tmp, _)| tmp.as_path()),
                filename,
                mode,
            )?;
            Ok((sha256, signature))
        })();

        let (sha256, signature) = match staged_result {
            Ok(v) => v,
            Err(e) => {
                remove_all(&staged);
                return Err(e);
            },
        };

        // Everything currently under the final names moves aside.
        let mut targets = vec![final_wheel.clone()];
        targets.extend(
            BUNDLE_SUFFIXES
                .iter()
                .map(|suffix| plugin_dir.join(format!("{filename}{suffix}"))),
        );
        let backups = match backup(&targets) {
            Ok(b) => b,
            Err(e) => {
                remove_all(&staged);
                return Err(e.into());
            },
        };

        let commit = (|| -> PluginResult<PluginManifest> {
            fs::rename(&tmp_wheel, &final_wheel)?;
            if let Some((_, tmp, dest)) = &bundle {
                fs::rename(tmp, dest)?;
            }
            let manifest = PluginManifest {
                plugin_name: name.to_string(),
                version: version.to_string(),
                wheel_filename: filename.to_string(),
                sha256,
                source: Some(package.source.clone()),
                installed_at: Utc::now(),
                signature: Some(signature),
            };
            manifest.save(plugin_dir)?;
            Ok(manifest)
        })();

        match commit {
            Ok(manifest) => {
                for (_, bak) in &backups {
                    let _ = fs::remove_file(bak);
                }
                let _ = fs::remove_dir_all(plugin_dir.join(extracted_dir_name(filename)));
                Ok(manifest)
            },
            Err(e) => {
                warn!(plugin = %name, error = %e, "Install failed, restoring previous files");
                remove_all(&staged);
                for target in &targets {
                    let _ = fs::remove_file(target);
                }
                for (original, bak) in &backups {
                    if let Err(restore) = fs::rename(bak, original) {
                        warn!(path = %original.display(), error = %restore, "Failed to restore backup");
                    }
                }
                Err(e)
            },
        }
    }

    /// All plugin directories with a readable manifest, sorted by name.
    #[must_use]
    pub fn list_installed(&self) -> Vec<InstalledPlugin> {
        scan_installed(&self.plugins_dir)
    }

    /// Find an installed plugin by package name, then by entry-point name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<InstalledPlugin> {
        if !is_safe_file_name(name) {
            warn!(plugin = %name, "Invalid plugin name");
            return None;
        }
        let direct = self.plugins_dir.join(name);
        if direct.join(MANIFEST_FILE).is_file()
            && let Some(installed) = load_installed(&direct)
        {
            return Some(installed);
        }
        self.list_installed().into_iter().find(|p| {
            p.entry_point.as_ref().is_some_and(|ep| ep.name == name)
        })
    }

    /// Installed version of `name`.
    #[must_use]
    pub fn get_installed_version(&self, name: &str) -> Option<String> {
        self.find(name).map(|p| p.manifest.version)
    }

    /// Whether `name` is installed.
    #[must_use]
    pub fn is_installed(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Remove the plugin directory for `name`.
    ///
    /// # Errors
    ///
    /// - [`PluginError::InvalidName`] for unsafe names
    /// - [`PluginError::NotInstalled`] when nothing matches
    /// - [`PluginError::Io`] if removal fails
    pub fn uninstall(&self, name: &str) -> PluginResult<InstalledPlugin> {
        validate_plugin_name(name)?;
        let installed = self
            .find(name)
            .ok_or_else(|| PluginError::NotInstalled(name.to_string()))?;
        fs::remove_dir_all(&installed.dir)?;
        info!(plugin = %name, dir = %installed.dir.display(), "Uninstalled plugin");
        Ok(installed)
    }
}

/// Plugin directories under `plugins_dir` with a readable manifest, sorted
/// by directory name.
#[must_use]
pub fn scan_installed(plugins_dir: &Path) -> Vec<InstalledPlugin> {
    let Ok(entries) = fs::read_dir(plugins_dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    dirs.into_iter()
        .filter_map(|dir| load_installed(&dir))
        .collect()
}

fn load_installed(dir: &Path) -> Option<InstalledPlugin> {
    if !dir.join(MANIFEST_FILE).is_file() {
        return None;
    }
    match PluginManifest::load(dir) {
        Ok(manifest) => {
            let wheel = manifest.wheel_path(dir);
            let entry_point = if wheel.is_file() {
                read_entry_point(&wheel)
            } else {
                None
            };
            Some(InstalledPlugin {
                dir: dir.to_path_buf(),
                manifest,
                entry_point,
            })
        },
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Invalid manifest");
            None
        },
    }
}

fn bundle_suffix(bundle: &Path) -> &'static str {
    let name = bundle.to_string_lossy();
    BUNDLE_SUFFIXES
        .iter()
        .rev()
        .find(|suffix| name.ends_with(*suffix))
        .copied()
        .unwrap_or(BUNDLE_SUFFIXES[0])
}

fn copy_hashed(src: &Path, dest: &Path) -> PluginResult<String> {
    let mut reader = File::open(src)?;
    let mut writer = HashingWriter::new(File::create(dest)?);
    io::copy(&mut reader, &mut writer)?;
    let (digest, file) = writer.finish();
    file.sync_all()?;
    Ok(digest)
}

/// Rename each existing target to `{target}.bak`.
fn backup(targets: &[PathBuf]) -> io::Result<Vec<(PathBuf, PathBuf)>> {
    let mut moved = Vec::new();
    for target in targets.iter().filter(|t| t.exists()) {
        let mut bak = target.clone().into_os_string();
        bak.push(".bak");
        let bak = PathBuf::from(bak);
        if let Err(e) = fs::rename(target, &bak) {
            for (original, bak) in &moved {
                let _ = fs::rename(bak, original);
            }
            return Err(e);
        }
        moved.push((target.clone(), bak));
    }
    Ok(moved)
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path)
            && e.kind() != io::ErrorKind::NotFound
        {
            debug!(path = %path.display(), error = %e, "Failed to remove staged file");
        }
    }
}

/// Remove a wheel, its bundles and its extraction directory.
fn remove_wheel_files(plugin_dir: &Path, wheel_filename: &str) {
    if !is_safe_file_name(wheel_filename) {
        return;
    }
    let _ = fs::remove_file(plugin_dir.join(wheel_filename));
    for suffix in BUNDLE_SUFFIXES {
        let _ = fs::remove_file(plugin_dir.join(format!("{wheel_filename}{suffix}")));
    }
    let _ = fs::remove_dir_all(plugin_dir.join(extracted_dir_name(wheel_filename)));
    debug!(wheel = %wheel_filename, "Removed previous install");
}
