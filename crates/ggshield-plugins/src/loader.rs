//! Plugin discovery and loading.
//!
//! Candidates come from two places:
//! - host-registered [`EntryPoint`]s
//! - wheels installed under the plugins directory
//!
//! They are merged by name, a local wheel overriding a same-named entry
//! point. Only candidates with an enablement record set to `enabled` load.
//! Each load is isolated: a failing plugin is logged and skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ggshield_core::{DottedVersion, host_version};
use tracing::{debug, error, info, warn};

use crate::context::PluginContext;
use crate::enterprise_config::EnterpriseConfig;
use crate::error::{PluginError, PluginResult};
use crate::installer::{extracted_dir_name, scan_installed};
use crate::plugin::{EntryPoint, FactoryTable, GgshieldPlugin, PluginFactory, PluginMetadata};
use crate::registry::PluginRegistry;
use crate::signature::{SignatureMode, SignatureStatus, SignatureVerifier};
use crate::wheel::{extract_wheel, read_entry_point};

/// Where a discovered plugin's code comes from.
#[derive(Debug, Clone)]
pub enum PluginOrigin {
    /// Declared by the host.
    EntryPoint(EntryPoint),
    /// Installed wheel.
    Wheel(PathBuf),
}

/// A load candidate, computed fresh on each discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Merge key: entry-point name, else manifest name.
    pub name: String,
    /// Code location.
    pub origin: PluginOrigin,
    /// Always true for discovered candidates.
    pub is_installed: bool,
    /// Enablement record says `enabled`.
    pub is_enabled: bool,
    /// Version, when known.
    pub version: Option<String>,
}

impl DiscoveredPlugin {
    /// Whether this candidate is an installed wheel.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.origin, PluginOrigin::Wheel(_))
    }
}

/// `current >= required` on dotted versions. Unparseable input on either
/// side is incompatible.
#[must_use]
pub fn is_version_compatible(required: &str, current: &str) -> bool {
    match (DottedVersion::parse(current), DottedVersion::parse(required)) {
        (Ok(current), Ok(required)) => current >= required,
        (Err(e), _) | (_, Err(e)) => {
            error!(required = %required, current = %current, error = %e, "Failed to parse version");
            false
        },
    }
}

/// Discovers candidates and loads the enabled ones into a [`PluginRegistry`].
pub struct PluginLoader {
    config: EnterpriseConfig,
    plugins_dir: PathBuf,
    entry_points: Vec<EntryPoint>,
    factory: Arc<dyn PluginFactory>,
    verifier: Arc<SignatureVerifier>,
    signature_mode: SignatureMode,
    host_version: String,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("plugins_dir", &self.plugins_dir)
            .field("entry_points", &self.entry_points)
            .field("signature_mode", &self.signature_mode)
            .field("host_version", &self.host_version)
            .finish_non_exhaustive()
    }
}

impl PluginLoader {
    /// Loader over `plugins_dir`, using the config's signature mode, no
    /// entry points and an empty factory table.
    #[must_use]
    pub fn new(config: EnterpriseConfig, plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            signature_mode: config.signature_mode(),
            config,
            plugins_dir: plugins_dir.into(),
            entry_points: Vec::new(),
            factory: Arc::new(FactoryTable::new()),
            verifier: Arc::new(SignatureVerifier::default()),
            host_version: host_version().to_string(),
        }
    }

    /// Loader using `ctx`'s plugins directory and verifier.
    #[must_use]
    pub fn from_context(ctx: &PluginContext, config: EnterpriseConfig) -> Self {
        let mut loader = Self::new(config, ctx.dirs.plugins_dir());
        loader.verifier = Arc::clone(&ctx.verifier);
        loader
    }

    /// Host-registered entry points.
    #[must_use]
    pub fn with_entry_points(mut self, entry_points: Vec<EntryPoint>) -> Self {
        self.entry_points = entry_points;
        self
    }

    /// Factory resolving wheel entry-point symbols.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Override the signature verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Override the signature mode from config.
    #[must_use]
    pub fn with_signature_mode(mut self, mode: SignatureMode) -> Self {
        self.signature_mode = mode;
        self
    }

    /// Override the host version used for compatibility checks.
    #[must_use]
    pub fn with_host_version(mut self, version: impl Into<String>) -> Self {
        self.host_version = version.into();
        self
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.config.get(name).is_some_and(|cfg| cfg.enabled)
    }

    /// Merge installed wheels and entry points into candidates, sorted by name.
    #[must_use]
    pub fn discover_plugins(&self) -> Vec<DiscoveredPlugin> {
        let mut discovered: BTreeMap<String, DiscoveredPlugin> = BTreeMap::new();

        for installed in scan_installed(&self.plugins_dir) {
            let wheel = installed.wheel_path();
            if !wheel.is_file() {
                debug!(dir = %installed.dir.display(), "Manifest without wheel, skipping");
                continue;
            }
            let name = installed.key().to_string();
            let is_enabled = installed
                .config_record(&self.config)
                .is_some_and(|cfg| cfg.enabled);
            discovered.insert(
                name.clone(),
                DiscoveredPlugin {
                    is_enabled,
                    name,
                    origin: PluginOrigin::Wheel(wheel),
                    is_installed: true,
                    version: Some(installed.manifest.version),
                },
            );
        }

        for ep in &self.entry_points {
            if discovered.contains_key(&ep.name) {
                debug!(plugin = %ep.name, "Entry point shadowed by local wheel");
                continue;
            }
            discovered.insert(
                ep.name.clone(),
                DiscoveredPlugin {
                    name: ep.name.clone(),
                    origin: PluginOrigin::EntryPoint(ep.clone()),
                    is_installed: true,
                    is_enabled: self.is_enabled(&ep.name),
                    version: ep.version.clone(),
                },
            );
        }

        discovered.into_values().collect()
    }

    /// Load every enabled candidate. Failures are logged and skipped.
    #[must_use]
    pub fn load_enabled_plugins(&self) -> PluginRegistry {
        let mut registry = PluginRegistry::new();

        for candidate in self.discover_plugins() {
            if !candidate.is_enabled {
                debug!(plugin = %candidate.name, "Skipping disabled plugin");
                continue;
            }
            match self.load_into(&candidate, &mut registry) {
                Ok(metadata) => {
                    info!(plugin = %metadata.name, version = %metadata.version, "Loaded plugin");
                },
                Err(e) => {
                    warn!(plugin = %candidate.name, error = %e, "Failed to load plugin");
                },
            }
        }

        registry
    }

    fn load_into(
        &self,
        candidate: &DiscoveredPlugin,
        registry: &mut PluginRegistry,
    ) -> PluginResult<PluginMetadata> {
        let mut plugin = match &candidate.origin {
            PluginOrigin::EntryPoint(ep) => ep.load(),
            PluginOrigin::Wheel(wheel) => self.load_from_wheel(wheel)?,
        };

        let metadata = plugin.metadata().clone();
        if !is_version_compatible(&metadata.min_ggshield_version, &self.host_version) {
            return Err(PluginError::IncompatibleVersion {
                plugin: metadata.name,
                required: metadata.min_ggshield_version,
                current: self.host_version.clone(),
            });
        }

        plugin.on_load()?;
        let mut staged = PluginRegistry::new();
        plugin.register(&mut staged)?;
        staged.register_plugin(plugin)?;
        registry.absorb(staged)?;
        if let Some(plugin) = registry.get_mut(&metadata.name) {
            plugin.on_loaded();
        }
        Ok(metadata)
    }

    fn load_from_wheel(&self, wheel: &Path) -> PluginResult<Box<dyn GgshieldPlugin>> {
        let info = self.verifier.verify_wheel(wheel, self.signature_mode)?;
        let file_name = wheel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match info.status {
            SignatureStatus::Valid => {
                info!(wheel = %file_name, identity = ?info.identity, "Signature valid");
            },
            SignatureStatus::Missing | SignatureStatus::Invalid => {
                warn!(
                    wheel = %file_name,
                    status = %info.status,
                    message = info.message.as_deref().unwrap_or(""),
                    "Loading plugin with unverified signature"
                );
            },
            SignatureStatus::Skipped => {},
        }

        let extract_dir = wheel.with_file_name(extracted_dir_name(&file_name));
        if needs_extraction(wheel, &extract_dir) {
            if extract_dir.exists() {
                fs::remove_dir_all(&extract_dir)?;
            }
            extract_wheel(wheel, &extract_dir)?;
            debug!(dir = %extract_dir.display(), "Extracted wheel");
        }

        let entry = read_entry_point(wheel).ok_or_else(|| PluginError::LoadFailed {
            plugin: file_name.clone(),
            message: "No entry point found in wheel".to_string(),
        })?;
        self.factory.load_from_path(&extract_dir, &entry.value)
    }
}

/// Missing, or older than the wheel.
fn needs_extraction(wheel: &Path, extract_dir: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(wheel), modified(extract_dir)) {
        (Some(wheel), Some(dir)) => wheel > dir,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::test_support::TestPlugin;
    use crate::wheel::test_support::build_wheel;

    fn alpha() -> Box<dyn GgshieldPlugin> {
        Box::new(TestPlugin::new("alpha", "1.0.0"))
    }

    fn beta_from_wheel() -> Box<dyn GgshieldPlugin> {
        Box::new(TestPlugin::new("beta-local", "1.0.0"))
    }

    fn beta_builtin() -> Box<dyn GgshieldPlugin> {
        Box::new(TestPlugin::new("beta-builtin", "1.0.0"))
    }

    fn too_new() -> Box<dyn GgshieldPlugin> {
        Box::new(TestPlugin::new("future", "99.0.0"))
    }

    fn broken() -> Box<dyn GgshieldPlugin> {
        let mut plugin = TestPlugin::new("broken", "1.0.0");
        plugin.fail_on_load = true;
        Box::new(plugin)
    }

    /// Install a wheel by hand: plugin dir, wheel, manifest.
    fn install_wheel(plugins_dir: &Path, name: &str, ep: (&str, &str)) {
        use crate::manifest::{PluginManifest, PluginSource};

        let dir = plugins_dir.join(name);
        fs::create_dir_all(&dir).unwrap();
        let wheel = build_wheel(&dir, name, "1.0.0", Some(ep));
        PluginManifest {
            plugin_name: name.to_string(),
            version: "1.0.0".to_string(),
            wheel_filename: wheel.file_name().unwrap().to_string_lossy().into_owned(),
            sha256: crate::acquire::sha256_file(&wheel).unwrap(),
            source: Some(PluginSource::GitGuardianApi),
            installed_at: chrono::Utc::now(),
            signature: None,
        }
        .save(&dir)
        .unwrap();
    }

    fn config(enabled: &[&str]) -> EnterpriseConfig {
        let mut config = EnterpriseConfig::default();
        for name in enabled {
            config.enable_plugin(name, None);
        }
        config
    }

    #[test]
    fn local_wheel_shadows_entry_point() {
        let tmp = tempfile::tempdir().unwrap();
        install_wheel(tmp.path(), "gg_beta", ("beta", "gg_beta.plugin:Beta"));

        let loader = PluginLoader::new(config(&["beta"]), tmp.path())
            .with_entry_points(vec![
                EntryPoint::new("beta", "builtin:Beta", beta_builtin),
                EntryPoint::new("alpha", "builtin:Alpha", alpha),
            ])
            .with_signature_mode(SignatureMode::Disabled);

        let discovered = loader.discover_plugins();
        assert_eq!(discovered.len(), 2);
        let beta = discovered.iter().find(|d| d.name == "beta").unwrap();
        assert!(beta.is_local());
        assert!(beta.is_enabled);
        let alpha = discovered.iter().find(|d| d.name == "alpha").unwrap();
        assert!(!alpha.is_enabled);
    }

    #[test]
    fn loads_enabled_plugins_and_isolates_failures() {
        let tmp = tempfile::tempdir().unwrap();
        install_wheel(tmp.path(), "gg_beta", ("beta", "gg_beta.plugin:Beta"));

        let factory = FactoryTable::new().with("gg_beta.plugin:Beta", beta_from_wheel);
        let loader = PluginLoader::new(
            config(&["alpha", "beta", "broken", "future", "disabled"]),
            tmp.path(),
        )
        .with_entry_points(vec![
            EntryPoint::new("alpha", "builtin:Alpha", alpha),
            EntryPoint::new("broken", "builtin:Broken", broken),
            EntryPoint::new("future", "builtin:Future", too_new),
        ])
        .with_factory(Arc::new(factory))
        .with_signature_mode(SignatureMode::Disabled)
        .with_host_version("1.41.0");

        let registry = loader.load_enabled_plugins();
        let names: Vec<_> = registry.list().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["alpha", "beta-local"]);
        assert!(registry.command("beta-local-cmd").is_some());
        assert!(
            tmp.path()
                .join("gg_beta/.gg_beta-1.0.0-py3-none-any_extracted/gg_beta/__init__.py")
                .is_file()
        );
    }

    fn dup_first() -> Box<dyn GgshieldPlugin> {
        let mut plugin = TestPlugin::new("dup", "1.0.0");
        plugin.command = "first-cmd".to_string();
        Box::new(plugin)
    }

    fn dup_second() -> Box<dyn GgshieldPlugin> {
        let mut plugin = TestPlugin::new("dup", "1.0.0");
        plugin.command = "second-cmd".to_string();
        Box::new(plugin)
    }

    #[test]
    fn rejected_plugin_leaves_no_commands_behind() {
        let registry = PluginLoader::new(config(&["first", "second"]), "/nonexistent")
            .with_entry_points(vec![
                EntryPoint::new("first", "builtin:First", dup_first),
                EntryPoint::new("second", "builtin:Second", dup_second),
            ])
            .load_enabled_plugins();

        assert_eq!(registry.len(), 1);
        assert!(registry.command("first-cmd").is_some());
        assert!(registry.command("second-cmd").is_none());
        assert_eq!(registry.commands().count(), 1);
    }

    #[test]
    fn strict_mode_skips_unsigned_wheels() {
        let tmp = tempfile::tempdir().unwrap();
        install_wheel(tmp.path(), "gg_beta", ("beta", "gg_beta.plugin:Beta"));
        let factory = FactoryTable::new().with("gg_beta.plugin:Beta", beta_from_wheel);

        let registry = PluginLoader::new(config(&["beta"]), tmp.path())
            .with_factory(Arc::new(factory))
            .with_signature_mode(SignatureMode::Strict)
            .load_enabled_plugins();
        assert!(registry.is_empty());
    }

    #[test]
    fn disabled_record_is_not_loaded() {
        let mut cfg = config(&[]);
        cfg.disable_plugin("alpha");
        let registry = PluginLoader::new(cfg, "/nonexistent")
            .with_entry_points(vec![EntryPoint::new("alpha", "builtin:Alpha", alpha)])
            .load_enabled_plugins();
        assert!(registry.is_empty());
    }

    #[test]
    fn version_compatibility() {
        assert!(is_version_compatible("1.41.0", "1.41.0"));
        assert!(is_version_compatible("1.2", "1.41.0"));
        assert!(!is_version_compatible("2.0.0", "1.41.0"));
        assert!(!is_version_compatible("not-a-version", "1.41.0"));
        assert!(!is_version_compatible("1.0.0", "garbage"));
    }
}
