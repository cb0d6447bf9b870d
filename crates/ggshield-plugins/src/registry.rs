//! Registry of loaded plugins and the commands they contribute.
//!
//! Built by the loader and handed to CLI dispatch as a plain value.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PluginError, PluginResult};
use crate::plugin::{GgshieldPlugin, PluginMetadata};

/// Handler for a plugin command; receives the arguments after the command name.
pub type CommandHandler = Box<dyn Fn(&[String]) -> PluginResult<i32> + Send + Sync>;

/// A top-level command contributed by a plugin.
pub struct PluginCommand {
    /// Command name.
    pub name: String,
    /// One-line help.
    pub about: String,
    run: CommandHandler,
}

impl fmt::Debug for PluginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCommand")
            .field("name", &self.name)
            .field("about", &self.about)
            .finish_non_exhaustive()
    }
}

impl PluginCommand {
    /// New command.
    pub fn new(
        name: impl Into<String>,
        about: impl Into<String>,
        run: impl Fn(&[String]) -> PluginResult<i32> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            run: Box::new(run),
        }
    }

    /// Invoke the handler, returning the process exit code.
    ///
    /// # Errors
    ///
    /// Propagates the handler's error.
    pub fn run(&self, args: &[String]) -> PluginResult<i32> {
        (self.run)(args)
    }
}

/// Loaded plugins and their commands.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Box<dyn GgshieldPlugin>>,
    commands: BTreeMap<String, PluginCommand>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::CommandConflict`] if the name is taken.
    pub fn register_command(&mut self, command: PluginCommand) -> PluginResult<()> {
        if self.commands.contains_key(&command.name) {
            return Err(PluginError::CommandConflict(command.name));
        }
        self.commands.insert(command.name.clone(), command);
        Ok(())
    }

    /// Add a loaded plugin under its metadata name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyRegistered`] if the name is taken.
    pub fn register_plugin(&mut self, plugin: Box<dyn GgshieldPlugin>) -> PluginResult<()> {
        let name = plugin.metadata().name.clone();
        if self.plugins.contains_key(&name) {
            return Err(PluginError::AlreadyRegistered(name));
        }
        self.plugins.insert(name, plugin);
        Ok(())
    }

    /// Move everything from `staged` into this registry, or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyRegistered`] or
    /// [`PluginError::CommandConflict`] on the first clash, leaving this
    /// registry unchanged.
    pub fn absorb(&mut self, staged: PluginRegistry) -> PluginResult<()> {
        if let Some(name) = staged.plugins.keys().find(|n| self.plugins.contains_key(*n)) {
            return Err(PluginError::AlreadyRegistered(name.clone()));
        }
        if let Some(name) = staged.commands.keys().find(|n| self.commands.contains_key(*n)) {
            return Err(PluginError::CommandConflict(name.clone()));
        }
        self.plugins.extend(staged.plugins);
        self.commands.extend(staged.commands);
        Ok(())
    }

    /// Loaded plugin by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn GgshieldPlugin> {
        self.plugins.get(name).map(|p| &**p)
    }

    /// Mutable access to a loaded plugin.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn GgshieldPlugin>> {
        self.plugins.get_mut(name)
    }

    /// Metadata of all loaded plugins, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<&PluginMetadata> {
        self.plugins.values().map(|p| p.metadata()).collect()
    }

    /// Command by name.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&PluginCommand> {
        self.commands.get(name)
    }

    /// All commands, sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = &PluginCommand> {
        self.commands.values()
    }

    /// Number of loaded plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
