//! Plugin capability interface and the dynamic loading boundary.
//!
//! A plugin is anything implementing [`GgshieldPlugin`]. Host-bundled plugins
//! are declared as [`EntryPoint`]s. Plugins installed from wheels are resolved
//! through a [`PluginFactory`], given the extracted wheel directory and the
//! entry-point symbol (`module.path:ClassName`).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, PluginResult};
use crate::registry::PluginRegistry;

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Display name.
    pub display_name: String,
    /// Short description.
    pub description: String,
    /// Minimum host version, dotted.
    pub min_ggshield_version: String,
}

/// A loadable plugin.
///
/// Lifecycle, driven by the loader: [`on_load`](Self::on_load), then
/// [`register`](Self::register), then registration in the registry, then
/// [`on_loaded`](Self::on_loaded).
pub trait GgshieldPlugin: Send {
    /// Plugin metadata.
    fn metadata(&self) -> &PluginMetadata;

    /// Register commands and capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if a command conflicts with an existing one.
    fn register(&self, registry: &mut PluginRegistry) -> PluginResult<()>;

    /// Pre-load hook.
    ///
    /// # Errors
    ///
    /// An error aborts loading of this plugin.
    fn on_load(&mut self) -> PluginResult<()> {
        Ok(())
    }

    /// Post-load hook.
    fn on_loaded(&mut self) {}
}

impl fmt::Debug for dyn GgshieldPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GgshieldPlugin")
            .field("name", &self.metadata().name)
            .field("version", &self.metadata().version)
            .finish()
    }
}

/// Constructor for a plugin instance.
pub type PluginConstructor = fn() -> Box<dyn GgshieldPlugin>;

/// A host-registered plugin declaration.
#[derive(Clone)]
pub struct EntryPoint {
    /// Entry-point name (the enablement key).
    pub name: String,
    /// Target symbol, `module.path:ClassName`.
    pub value: String,
    /// Version of the distribution providing it.
    pub version: Option<String>,
    /// Constructor.
    pub constructor: PluginConstructor,
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl EntryPoint {
    /// Declare an entry point.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        constructor: PluginConstructor,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            version: None,
            constructor,
        }
    }

    /// Set the providing distribution's version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Construct the plugin.
    #[must_use]
    pub fn load(&self) -> Box<dyn GgshieldPlugin> {
        (self.constructor)()
    }
}

/// Resolves an entry-point symbol inside an extracted wheel to an instance.
pub trait PluginFactory: Send + Sync {
    /// Load the plugin `symbol` from the extracted wheel at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::UnknownSymbol`] or a load failure.
    fn load_from_path(&self, path: &Path, symbol: &str) -> PluginResult<Box<dyn GgshieldPlugin>>;
}

/// [`PluginFactory`] backed by constructors registered per symbol.
///
/// The extracted directory is only checked for existence; code comes from
/// the constructor compiled into the host.
#[derive(Default)]
pub struct FactoryTable {
    constructors: HashMap<String, PluginConstructor>,
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.constructors.keys().collect();
        symbols.sort();
        f.debug_struct("FactoryTable")
            .field("symbols", &symbols)
            .finish()
    }
}

impl FactoryTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` for `symbol`, replacing any previous one.
    #[must_use]
    pub fn with(mut self, symbol: impl Into<String>, constructor: PluginConstructor) -> Self {
        self.insert(symbol, constructor);
        self
    }

    /// Register `constructor` for `symbol`, replacing any previous one.
    pub fn insert(&mut self, symbol: impl Into<String>, constructor: PluginConstructor) {
        self.constructors.insert(symbol.into(), constructor);
    }

    /// Whether a constructor is registered for `symbol`.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.constructors.contains_key(symbol)
    }
}

impl PluginFactory for FactoryTable {
    fn load_from_path(&self, path: &Path, symbol: &str) -> PluginResult<Box<dyn GgshieldPlugin>> {
        if !path.is_dir() {
            return Err(PluginError::LoadFailed {
                plugin: symbol.to_string(),
                message: format!("extracted plugin directory missing: {}", path.display()),
            });
        }
        let constructor = self
            .constructors
            .get(symbol)
            .ok_or_else(|| PluginError::UnknownSymbol(symbol.to_string()))?;
        Ok(constructor())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::TestPlugin;
    use super::*;

    fn make() -> Box<dyn GgshieldPlugin> {
        Box::new(TestPlugin::new("demo", "1.0.0"))
    }

    #[test]
    fn factory_table_resolves_symbols() {
        let tmp = tempfile::tempdir().unwrap();
        let table = FactoryTable::new().with("demo.plugin:Demo", make);
        assert!(table.contains("demo.plugin:Demo"));

        let plugin = table
            .load_from_path(tmp.path(), "demo.plugin:Demo")
            .unwrap();
        assert_eq!(plugin.metadata().name, "demo");

        assert!(matches!(
            table.load_from_path(tmp.path(), "other:Plugin"),
            Err(PluginError::UnknownSymbol(_))
        ));
        assert!(matches!(
            table.load_from_path(&tmp.path().join("missing"), "demo.plugin:Demo"),
            Err(PluginError::LoadFailed { .. })
        ));
    }

    #[test]
    fn entry_point_constructs() {
        let ep = EntryPoint::new("demo", "demo.plugin:Demo", make).with_version("1.0.0");
        assert_eq!(ep.load().metadata().name, "demo");
        assert_eq!(ep.version.as_deref(), Some("1.0.0"));
    }
}
