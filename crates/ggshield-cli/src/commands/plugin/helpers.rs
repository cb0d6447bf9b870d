//! Shared pieces of the plugin commands.

use std::path::Path;

use ggshield_plugins::context::PluginContext;
use ggshield_plugins::enterprise_config::EnterpriseConfig;
use ggshield_plugins::installer::PluginInstaller;
use ggshield_plugins::PluginError;

use crate::builtin;
use crate::exit::ExitCode;
use crate::printer::Printer;

/// Load the enablement store, reporting failures.
pub(crate) fn load_config(path: &Path, p: &mut Printer<'_>) -> Result<EnterpriseConfig, ExitCode> {
    EnterpriseConfig::load_or_default(path).map_err(|e| {
        p.error(&e.to_string());
        ExitCode::UnexpectedError
    })
}

/// Apply `f` to the enablement store and save it, reporting failures.
pub(crate) fn update_config(
    path: &Path,
    p: &mut Printer<'_>,
    f: impl FnOnce(&mut EnterpriseConfig),
) -> Result<(), ExitCode> {
    EnterpriseConfig::update(path, f).map_err(|e| {
        p.error(&format!("Failed to save plugin configuration: {e}"));
        ExitCode::UnexpectedError
    })
}

/// Print `Failed to {action} {target}: {error}` and pick the exit code.
pub(crate) fn fail(p: &mut Printer<'_>, action: &str, target: &str, error: &PluginError) -> ExitCode {
    p.error(&format!("Failed to {action} {target}: {error}"));
    ExitCode::for_error(error)
}

/// Name of the enablement record for `name`: the installed plugin's key when
/// installed, or `name` itself when a builtin entry point declares it.
pub(crate) fn resolve_enable_key(
    ctx: &PluginContext,
    config: &EnterpriseConfig,
    name: &str,
) -> Option<String> {
    if let Some(installed) = PluginInstaller::from_context(ctx).find(name) {
        return Some(installed.enable_key().to_string());
    }
    builtin::loader(ctx, config.clone())
        .discover_plugins()
        .into_iter()
        .find(|p| p.name == name)
        .map(|p| p.name)
}

/// `1 plugin`, `2 plugins`.
pub(crate) fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

pub(crate) fn print_not_installed(p: &mut Printer<'_>, name: &str, hint: &str) -> ExitCode {
    p.error(&PluginError::NotInstalled(name.to_string()).to_string());
    p.info(hint);
    ExitCode::UsageError
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pluralizes() {
        assert_eq!(plural(1, "plugin"), "1 plugin");
        assert_eq!(plural(0, "plugin"), "0 plugins");
        assert_eq!(plural(3, "plugin"), "3 plugins");
    }
}
