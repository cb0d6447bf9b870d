//! `ggshield plugin enable|disable|uninstall`.

use ggshield_plugins::context::PluginContext;
use ggshield_plugins::installer::PluginInstaller;

use super::helpers::{fail, load_config, print_not_installed, resolve_enable_key, update_config};
use crate::exit::ExitCode;
use crate::printer::Printer;

pub(crate) fn enable_plugin(ctx: &PluginContext, name: &str, p: &mut Printer<'_>) -> ExitCode {
    let path = ctx.dirs.enterprise_config_path();
    let config = match load_config(&path, p) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let Some(key) = resolve_enable_key(ctx, &config, name) else {
        return print_not_installed(p, name, "Use 'ggshield plugin install' to install it first");
    };

    if let Err(code) = update_config(&path, p, |c| c.enable_plugin(&key, None)) {
        return code;
    }
    p.success(&format!("Enabled plugin: {name}"));
    ExitCode::Success
}

pub(crate) fn disable_plugin(ctx: &PluginContext, name: &str, p: &mut Printer<'_>) -> ExitCode {
    let path = ctx.dirs.enterprise_config_path();
    let config = match load_config(&path, p) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let key = match resolve_enable_key(ctx, &config, name) {
        Some(key) => key,
        // A stale record can still be switched off.
        None if config.get(name).is_some() => name.to_string(),
        None => {
            return print_not_installed(p, name, "Use 'ggshield plugin list' to see installed plugins");
        },
    };

    if let Err(code) = update_config(&path, p, |c| c.disable_plugin(&key)) {
        return code;
    }
    p.success(&format!("Disabled plugin: {name}"));
    ExitCode::Success
}

/// Remove `name` after `confirm` agrees (skipped with `yes`).
pub(crate) fn uninstall_plugin(
    ctx: &PluginContext,
    name: &str,
    yes: bool,
    confirm: impl FnOnce(&str) -> bool,
    p: &mut Printer<'_>,
) -> ExitCode {
    let installer = PluginInstaller::from_context(ctx);
    let Some(installed) = installer.find(name) else {
        return print_not_installed(p, name, "Use 'ggshield plugin list' to see installed plugins");
    };

    if !yes && !confirm(&format!("Uninstall plugin '{name}'?")) {
        p.info("Uninstall cancelled.");
        return ExitCode::Success;
    }

    if let Err(e) = installer.uninstall(name) {
        return fail(p, "uninstall", name, &e);
    }

    let keys = [
        name.to_string(),
        installed.enable_key().to_string(),
        installed.manifest.plugin_name.clone(),
    ];
    if let Err(code) = update_config(&ctx.dirs.enterprise_config_path(), p, |c| {
        for key in &keys {
            c.remove_plugin(key);
        }
    }) {
        return code;
    }

    p.success(&format!("Uninstalled plugin: {name}"));
    ExitCode::Success
}
