//! ggshield CLI - plugin distribution and management.
//!
//! Installs, verifies, updates and removes ggshield plugins, and dispatches
//! top-level commands contributed by enabled plugins.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ggshield_core::GgshieldDirs;
use ggshield_plugins::context::{DEFAULT_API_URL, PluginContext};
use ggshield_plugins::enterprise_config::EnterpriseConfig;
use ggshield_plugins::http::BlockingHttp;
use ggshield_telemetry::{LogConfig, LogFormat, setup_logging};

mod builtin;
mod commands;
mod exit;
mod printer;
mod theme;

use commands::plugin::{self, InstallRequest, UpdateRequest};
use exit::ExitCode;
use printer::Printer;
use theme::Theme;

/// ggshield - plugin management
#[derive(Parser)]
#[command(name = "ggshield")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// GitGuardian API URL
    #[arg(long, global = true, env = "GITGUARDIAN_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// GitGuardian API key
    #[arg(long, global = true, env = "GITGUARDIAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Commands provided by enabled plugins
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(Subcommand)]
enum PluginCommands {
    /// Install a plugin from GitGuardian, a local wheel, or an HTTPS URL
    Install {
        /// Plugin name, path to a .whl file, or URL (GitHub release assets
        /// and Actions artifacts are recognised)
        source: String,

        /// Version to install (GitGuardian plugins only; defaults to latest)
        #[arg(long)]
        version: Option<String>,

        /// Expected SHA-256 of the wheel (URL and file sources)
        #[arg(long)]
        sha256: Option<String>,

        /// Install even if the signature is missing or invalid
        #[arg(long)]
        allow_unsigned: bool,
    },

    /// Remove an installed plugin
    Uninstall {
        /// Plugin name
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Enable an installed plugin
    Enable {
        /// Plugin name
        name: String,
    },

    /// Disable a plugin without uninstalling it
    Disable {
        /// Plugin name
        name: String,
    },

    /// List installed plugins
    List,

    /// Show plugins available to your GitGuardian account
    Status,

    /// Update installed plugins
    Update {
        /// Plugin to update
        name: Option<String>,

        /// Update all installed plugins
        #[arg(long)]
        all: bool,

        /// Check for updates without installing
        #[arg(long)]
        check: bool,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let log_config = LogConfig::new(level)
        .with_format(LogFormat::Compact)
        .with_env_directives();
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("{e:#}")));
            return ExitCode::UnexpectedError.into();
        },
    };

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    let mut p = Printer::new(&mut out, &mut err);

    let code = match cli.command {
        Commands::Plugin { command } => handle_plugin(&ctx, command, &mut p),
        Commands::External(args) => handle_external(&ctx, &args, &mut p),
    };
    let _ = p.flush();
    code.into()
}

fn build_context(cli: &Cli) -> anyhow::Result<PluginContext> {
    let dirs = GgshieldDirs::resolve().context("failed to resolve ggshield directories")?;
    let http = BlockingHttp::new().context("failed to create HTTP client")?;
    Ok(PluginContext::new(dirs, Arc::new(http)).with_api(cli.api_url.clone(), cli.api_key.clone()))
}

fn handle_plugin(ctx: &PluginContext, command: PluginCommands, p: &mut Printer<'_>) -> ExitCode {
    match command {
        PluginCommands::Install {
            source,
            version,
            sha256,
            allow_unsigned,
        } => {
            let request = InstallRequest {
                source,
                version,
                sha256,
                allow_unsigned,
            };
            plugin::install_plugin(ctx, &request, p)
        },
        PluginCommands::Uninstall { name, yes } => {
            plugin::uninstall_plugin(ctx, &name, yes, confirm, p)
        },
        PluginCommands::Enable { name } => plugin::enable_plugin(ctx, &name, p),
        PluginCommands::Disable { name } => plugin::disable_plugin(ctx, &name, p),
        PluginCommands::List => plugin::list_plugins(ctx, p),
        PluginCommands::Status => plugin::show_status(ctx, p),
        PluginCommands::Update { name, all, check } => {
            plugin::update_plugins(ctx, &UpdateRequest { name, all, check }, p)
        },
    }
}

fn handle_external(ctx: &PluginContext, args: &[String], p: &mut Printer<'_>) -> ExitCode {
    let config = match EnterpriseConfig::load_or_default(&ctx.dirs.enterprise_config_path()) {
        Ok(config) => config,
        Err(e) => {
            p.error(&e.to_string());
            return ExitCode::UnexpectedError;
        },
    };
    let loader = builtin::loader(ctx, config);
    commands::external::run_plugin_command(&loader, args, p)
}

fn confirm(prompt: &str) -> bool {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_install_flags() {
        let cli = Cli::try_parse_from([
            "ggshield",
            "plugin",
            "install",
            "https://example.com/p.whl",
            "--sha256",
            "abc",
            "--allow-unsigned",
        ])
        .unwrap();
        match cli.command {
            Commands::Plugin {
                command:
                    PluginCommands::Install {
                        source,
                        sha256,
                        allow_unsigned,
                        version,
                    },
            } => {
                assert_eq!(source, "https://example.com/p.whl");
                assert_eq!(sha256.as_deref(), Some("abc"));
                assert!(allow_unsigned);
                assert!(version.is_none());
            },
            _ => panic!("expected plugin install"),
        }
    }

    #[test]
    fn unknown_top_level_command_is_external() {
        let cli = Cli::try_parse_from(["ggshield", "tokenscanner-scan", "--deep", "."]).unwrap();
        match cli.command {
            Commands::External(args) => assert_eq!(args, ["tokenscanner-scan", "--deep", "."]),
            Commands::Plugin { .. } => panic!("expected external command"),
        }
    }

    #[test]
    fn external_dispatch_runs_enabled_builtin() {
        use ggshield_test::{FakeHttp, StaticOracle, TestEnv, WheelBuilder};

        let env = TestEnv::new().unwrap();
        let ctx = env.context(&FakeHttp::new(), Arc::new(StaticOracle::accept()));
        let wheel = WheelBuilder::new("tokenscanner", "1.0.0")
            .entry_point("tokenscanner", "tokenscanner.plugin:Plugin")
            .build(&env.scratch().unwrap())
            .unwrap();
        let args = vec![builtin::INSPECT_COMMAND.to_string(), wheel.display().to_string()];

        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = handle_external(&ctx, &args, &mut Printer::new(&mut out, &mut err));
        assert_eq!(code, ExitCode::UsageError);

        EnterpriseConfig::update(&env.dirs.enterprise_config_path(), |c| {
            c.enable_plugin("inspect", None);
        })
        .unwrap();
        let code = handle_external(&ctx, &args, &mut Printer::new(&mut out, &mut err));
        assert_eq!(code, ExitCode::Success);
    }

    #[test]
    fn uninstall_accepts_short_yes() {
        let cli = Cli::try_parse_from(["ggshield", "plugin", "uninstall", "tokenscanner", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Plugin {
                command: PluginCommands::Uninstall { yes: true, .. }
            }
        ));
    }
}
