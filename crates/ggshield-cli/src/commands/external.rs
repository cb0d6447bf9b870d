//! Dispatch of top-level commands contributed by plugins.

use ggshield_plugins::loader::PluginLoader;

use crate::exit::ExitCode;
use crate::printer::Printer;

/// Load enabled plugins and run the command named by `args[0]`.
pub(crate) fn run_plugin_command(loader: &PluginLoader, args: &[String], p: &mut Printer<'_>) -> ExitCode {
    let Some((name, rest)) = args.split_first() else {
        p.error("No command given");
        return ExitCode::UsageError;
    };

    let registry = loader.load_enabled_plugins();
    let Some(command) = registry.command(name) else {
        p.error(&format!("No such command '{name}'"));
        let available: Vec<_> = registry.commands().map(|c| c.name.as_str()).collect();
        if !available.is_empty() {
            p.info(&format!("Plugin commands: {}", available.join(", ")));
        }
        return ExitCode::UsageError;
    };

    tracing::debug!(command = %name, args = rest.len(), "Running plugin command");
    match command.run(rest) {
        Ok(code) => ExitCode::from_plugin(code),
        Err(e) => {
            p.error(&format!("{name}: {e}"));
            ExitCode::UnexpectedError
        },
    }
}

#[cfg(test)]
mod tests {
    use ggshield_plugins::enterprise_config::EnterpriseConfig;
    use ggshield_plugins::plugin::{EntryPoint, GgshieldPlugin};
    use ggshield_test::DemoPlugin;

    use super::*;
    use crate::printer::capture::Captured;

    fn tokenscanner() -> Box<dyn GgshieldPlugin> {
        DemoPlugin::boxed("tokenscanner", "1.0.0")
    }

    fn loader(enabled: bool) -> PluginLoader {
        let tmp = std::env::temp_dir().join("ggshield-cli-no-plugins");
        let mut config = EnterpriseConfig::default();
        if enabled {
            config.enable_plugin("tokenscanner", None);
        }
        PluginLoader::new(config, tmp).with_entry_points(vec![EntryPoint::new(
            "tokenscanner",
            "tokenscanner.plugin:TokenScanner",
            tokenscanner,
        )])
    }

    #[test]
    fn runs_enabled_plugin_command() {
        let args: Vec<String> = ["tokenscanner-scan", "a", "b"].map(String::from).to_vec();
        let mut cap = Captured::new();
        let code = run_plugin_command(&loader(true), &args, &mut cap.printer());
        assert_eq!(code, ExitCode::Plugin(2));
    }

    #[test]
    fn disabled_plugin_command_is_unknown() {
        let args = vec!["tokenscanner-scan".to_string()];
        let mut cap = Captured::new();
        let code = run_plugin_command(&loader(false), &args, &mut cap.printer());
        assert_eq!(code, ExitCode::UsageError);
        assert!(cap.stderr().contains("No such command 'tokenscanner-scan'"));
    }
}
