//! `ggshield plugin status`.

use ggshield_core::DottedVersion;
use ggshield_plugins::catalog::CatalogClient;
use ggshield_plugins::context::PluginContext;
use ggshield_plugins::installer::PluginInstaller;

use super::helpers::load_config;
use crate::exit::ExitCode;
use crate::printer::Printer;

pub(crate) fn show_status(ctx: &PluginContext, p: &mut Printer<'_>) -> ExitCode {
    let catalog = match CatalogClient::new(ctx).fetch_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            p.error(&format!("Failed to fetch plugin catalog: {e}"));
            return ExitCode::UnexpectedError;
        },
    };
    let config = match load_config(&ctx.dirs.enterprise_config_path(), p) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let installer = PluginInstaller::from_context(ctx);

    p.heading("Account Status");
    p.line(&format!("Plan: {}", catalog.plan));

    if !catalog.features.is_empty() {
        p.blank();
        p.heading("Features");
        for (feature, enabled) in &catalog.features {
            let (icon, state) = if *enabled { ("+", "enabled") } else { ("-", "disabled") };
            p.line(&format!("  [{icon}] {feature}: {state}"));
        }
    }

    p.blank();
    p.heading("Available Plugins");
    for plugin in &catalog.plugins {
        if !plugin.available {
            p.line(&format!("  {} ({}) - not available", plugin.display_name, plugin.name));
            if let Some(reason) = &plugin.reason {
                p.line(&format!("    Reason: {reason}"));
            }
            continue;
        }

        let latest = plugin.latest_version.as_deref().unwrap_or("unknown");
        let mut parts = Vec::new();
        match installer.get_installed_version(&plugin.name) {
            Some(installed) => {
                parts.push(format!("installed v{installed}"));
                parts.push(
                    if config.is_plugin_enabled(&plugin.name) { "enabled" } else { "disabled" }
                        .to_string(),
                );
                if DottedVersion::is_upgrade(&installed, latest) {
                    parts.push(format!("update available: v{latest}"));
                }
            },
            None => parts.push(format!("available v{latest}")),
        }

        p.line(&format!("  {} ({})", plugin.display_name, plugin.name));
        p.line(&format!("    Status: {}", parts.join(", ")));
        if !plugin.description.is_empty() {
            p.line(&format!("    {}", plugin.description));
        }
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ggshield_test::{FakeHttp, StaticOracle, TEST_API_URL, TestEnv, catalog_json};
    use serde_json::json;

    use super::*;
    use crate::printer::capture::Captured;

    #[test]
    fn renders_plan_features_and_plugins() {
        let env = TestEnv::new().unwrap();
        let mut catalog = catalog_json(&[("tokenscanner", "1.2.0", true), ("teamscan", "0.3.0", false)]);
        catalog["account"]["features"] = json!({ "plugins": true, "beta": false });
        let http = FakeHttp::new().with_json(format!("{TEST_API_URL}/v1/plugins"), 200, &catalog);
        let ctx = env.context(&http, Arc::new(StaticOracle::accept()));

        let mut cap = Captured::new();
        assert_eq!(show_status(&ctx, &mut cap.printer()), ExitCode::Success);
        let out = cap.stdout();
        assert!(out.contains("Plan: business"));
        assert!(out.contains("  [-] beta: disabled"));
        assert!(out.contains("  [+] plugins: enabled"));
        assert!(out.contains("  tokenscanner (tokenscanner)"));
        assert!(out.contains("    Status: available v1.2.0"));
        assert!(out.contains("  teamscan (teamscan) - not available"));
        assert!(out.contains("    Reason: Requires Business plan"));
    }

    #[test]
    fn catalog_failure_is_unexpected() {
        let env = TestEnv::new().unwrap();
        let http = FakeHttp::new().with_response(format!("{TEST_API_URL}/v1/plugins"), 500, "oops");
        let ctx = env.context(&http, Arc::new(StaticOracle::accept()));

        let mut cap = Captured::new();
        assert_eq!(show_status(&ctx, &mut cap.printer()), ExitCode::UnexpectedError);
        assert!(cap.stderr().contains("Failed to fetch plugin catalog: Failed to fetch plugins: HTTP 500"));
    }
}
