//! `ggshield plugin update`.

use ggshield_plugins::context::PluginContext;
use ggshield_plugins::installer::PluginInstaller;
use ggshield_plugins::update::{UpdateChecker, UpdatePlan, UpdateSummary, select_for_update};

use super::helpers::{load_config, plural, print_not_installed};
use crate::exit::ExitCode;
use crate::printer::Printer;

/// Arguments of `plugin update`.
#[derive(Debug, Clone, Default)]
pub(crate) struct UpdateRequest {
    pub(crate) name: Option<String>,
    pub(crate) all: bool,
    pub(crate) check: bool,
}

pub(crate) fn update_plugins(
    ctx: &PluginContext,
    request: &UpdateRequest,
    p: &mut Printer<'_>,
) -> ExitCode {
    if request.name.is_none() && !request.all && !request.check {
        p.error("Please specify a plugin name, use --all, or use --check");
        p.line("Usage: ggshield plugin update <plugin_name>");
        p.line("       ggshield plugin update --all");
        p.line("       ggshield plugin update --check");
        return ExitCode::UsageError;
    }

    let config_path = ctx.dirs.enterprise_config_path();
    let mut config = match load_config(&config_path, p) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let mut installed = PluginInstaller::from_context(ctx).list_installed();
    let target = request.name.as_deref().filter(|_| !request.all);
    if let Some(name) = target {
        installed.retain(|plugin| plugin.matches(name) || plugin.enable_key() == name);
        if installed.is_empty() {
            return print_not_installed(p, name, "Use 'ggshield plugin list' to see installed plugins");
        }
    }
    if installed.is_empty() {
        p.info("No plugins installed.");
        p.line("Use 'ggshield plugin install' to install plugins.");
        return ExitCode::Success;
    }

    let selection = select_for_update(installed, &config, request.all);
    if let Some(name) = target
        && selection.selected.is_empty()
        && !selection.disabled.is_empty()
    {
        p.info(&format!("Plugin '{name}' is disabled."));
        p.line(&format!("Use 'ggshield plugin enable {name}' to enable it before updating."));
        return ExitCode::Success;
    }
    for name in &selection.disabled {
        p.dimmed(&format!("Skipping disabled plugin '{name}'"));
    }
    for name in &selection.pinned {
        p.dimmed(&format!("Skipping '{name}' (auto_update is off)"));
    }
    if selection.selected.is_empty() {
        p.info("No enabled plugins to update.");
        return ExitCode::Success;
    }

    let checker = UpdateChecker::new(ctx);
    let plan = match checker.check(&selection.selected) {
        Ok(plan) => plan,
        Err(e) => {
            p.error(&format!("Failed to check for updates: {e}"));
            return ExitCode::for_error(&e);
        },
    };

    if request.check {
        report_plan(&plan, p);
        return ExitCode::Success;
    }

    if plan.updates.is_empty() {
        match target {
            Some(name) => p.info(&format!("Plugin '{name}' is already up to date.")),
            None => p.info("All plugins are already up to date."),
        }
        report_non_updatable(&plan, p);
        return ExitCode::Success;
    }

    let mode = config.signature_mode();
    let mut summary = UpdateSummary::default();
    for update in &plan.updates {
        p.info(&format!(
            "Updating {}: {} -> {}...",
            update.name, update.current_version, update.latest_version
        ));
        let step = checker.apply_updates(std::slice::from_ref(update), mode, &mut config, |u, result| {
            match result {
                Ok(outcome) => p.success(&format!("  Updated {} to v{}", u.name, outcome.version)),
                Err(e) => p.error(&format!("  Failed to update {}: {e}", u.name)),
            }
        });
        summary.succeeded = summary.succeeded.saturating_add(step.succeeded);
        summary.failed = summary.failed.saturating_add(step.failed);
    }

    if let Err(e) = config.save(&config_path) {
        p.error(&format!("Failed to save plugin configuration: {e}"));
        return ExitCode::UnexpectedError;
    }

    if summary.succeeded > 0 {
        p.blank();
        p.success(&format!("{} updated successfully.", plural(summary.succeeded, "plugin")));
    }
    if summary.failed > 0 {
        return ExitCode::UnexpectedError;
    }
    ExitCode::Success
}

fn report_plan(plan: &UpdatePlan, p: &mut Printer<'_>) {
    if plan.updates.is_empty() {
        p.info("All plugins are up to date.");
    } else {
        p.heading("Updates Available");
        for update in &plan.updates {
            p.line(&format!("  {update}"));
        }
        p.blank();
        p.line("Run 'ggshield plugin update --all' to update.");
    }
    report_non_updatable(plan, p);
}

fn report_non_updatable(plan: &UpdatePlan, p: &mut Printer<'_>) {
    if plan.non_updatable.is_empty() {
        return;
    }
    p.blank();
    p.dimmed("Cannot be checked automatically (reinstall from source to update):");
    for item in &plan.non_updatable {
        p.dimmed(&format!(
            "  {} v{} ({})",
            item.name,
            item.version,
            item.source.display_label()
        ));
    }
}
