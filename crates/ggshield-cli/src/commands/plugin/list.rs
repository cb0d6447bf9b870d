//! `ggshield plugin list`.

use ggshield_plugins::context::PluginContext;
use ggshield_plugins::installer::PluginInstaller;
use ggshield_plugins::loader::DiscoveredPlugin;

use super::helpers::{load_config, plural};
use crate::builtin;
use crate::exit::ExitCode;
use crate::printer::Printer;
use crate::theme::Theme;

pub(crate) fn list_plugins(ctx: &PluginContext, p: &mut Printer<'_>) -> ExitCode {
    let config = match load_config(&ctx.dirs.enterprise_config_path(), p) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let (local, builtins): (Vec<_>, Vec<_>) = builtin::loader(ctx, config)
        .discover_plugins()
        .into_iter()
        .partition(DiscoveredPlugin::is_local);

    if local.is_empty() {
        p.info("No plugins installed.");
        p.blank();
        p.line("To see available plugins:");
        p.line("  ggshield plugin status");
        p.blank();
        p.line("To install a plugin:");
        p.line("  ggshield plugin install <plugin_name>");
    } else {
        let installer = PluginInstaller::from_context(ctx);
        p.heading("Installed Plugins");
        for plugin in &local {
            let mut parts = describe(plugin);
            parts.push("local".to_string());
            if let Some(label) = installer
                .find(&plugin.name)
                .and_then(|installed| installed.manifest.signature_label())
            {
                parts.push(format!("signature: {label}"));
            }
            p.line(&format!("  {}: {}", plugin.name, parts.join(", ")));
        }
        p.blank();
        p.dimmed(&plural(local.len(), "plugin"));
    }

    if !builtins.is_empty() {
        p.blank();
        p.heading("Built-in Plugins");
        for plugin in &builtins {
            p.line(&format!("  {}: {}", plugin.name, describe(plugin).join(", ")));
        }
    }
    ExitCode::Success
}

fn describe(plugin: &DiscoveredPlugin) -> Vec<String> {
    let mut parts = Vec::new();
    if let Some(version) = &plugin.version {
        parts.push(format!("v{version}"));
    }
    parts.push(Theme::state(plugin.is_enabled));
    parts
}
