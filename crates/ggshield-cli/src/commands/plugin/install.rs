//! `ggshield plugin install`.

use ggshield_plugins::acquire::{AcquireOptions, acquirer_for};
use ggshield_plugins::context::PluginContext;
use ggshield_plugins::installer::PluginInstaller;
use ggshield_plugins::source::{ResolvedSource, resolve_source};
use ggshield_plugins::{InstallOutcome, PluginError, PluginResult, SignatureMode};

use super::helpers::{fail, load_config, update_config};
use crate::exit::ExitCode;
use crate::printer::Printer;

/// Arguments of `plugin install`.
#[derive(Debug, Clone, Default)]
pub(crate) struct InstallRequest {
    pub(crate) source: String,
    pub(crate) version: Option<String>,
    pub(crate) sha256: Option<String>,
    pub(crate) allow_unsigned: bool,
}

pub(crate) fn install_plugin(
    ctx: &PluginContext,
    request: &InstallRequest,
    p: &mut Printer<'_>,
) -> ExitCode {
    let resolved = match resolve_source(&request.source) {
        Ok(resolved) => resolved,
        Err(e) => {
            p.error(&e.to_string());
            return ExitCode::for_error(&e);
        },
    };

    let config_path = ctx.dirs.enterprise_config_path();
    let config = match load_config(&config_path, p) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let mode = if request.allow_unsigned {
        config.signature_mode().allow_unsigned()
    } else {
        config.signature_mode()
    };

    warn_about_source(&resolved, request, p);
    if mode == SignatureMode::Warn && request.allow_unsigned {
        p.warning("Signature enforcement lowered to warn (--allow-unsigned).");
    }
    p.info(&format!("Installing {}...", request.source.trim()));

    let outcome = match acquire_and_install(ctx, &resolved, request, mode) {
        Ok(outcome) => outcome,
        Err(e) => return report_failure(p, request.source.trim(), &e),
    };

    let (key, version) = (outcome.enable_key.clone(), outcome.version.clone());
    if let Err(code) = update_config(&config_path, p, |c| c.enable_plugin(&key, Some(&version))) {
        return code;
    }

    p.success(&format!("Installed {} v{}", outcome.name, outcome.version));
    if outcome.enable_key != outcome.name {
        p.dimmed(&format!("  Enabled as {}", outcome.enable_key));
    }
    if let Some(label) = outcome.manifest.signature_label() {
        p.dimmed(&format!("  Signature: {label}"));
    }
    ExitCode::Success
}

fn acquire_and_install(
    ctx: &PluginContext,
    resolved: &ResolvedSource,
    request: &InstallRequest,
    mode: SignatureMode,
) -> PluginResult<InstallOutcome> {
    let options = AcquireOptions {
        version: request.version.clone(),
        sha256: request.sha256.clone(),
    };
    let package = acquirer_for(resolved, ctx, &options).acquire()?;
    PluginInstaller::from_context(ctx).install(&package, mode)
}

fn warn_about_source(resolved: &ResolvedSource, request: &InstallRequest, p: &mut Printer<'_>) {
    match resolved {
        ResolvedSource::Registry { .. } => {
            if request.sha256.is_some() {
                p.warning("--sha256 is ignored for GitGuardian plugins; the registry checksum is always verified.");
            }
            return;
        },
        ResolvedSource::LocalFile { .. } => {
            p.warning("Installing from a local wheel. This plugin is not from GitGuardian; only install plugins you trust.");
        },
        ResolvedSource::Url { .. } | ResolvedSource::GitHubRelease { .. } => {},
        ResolvedSource::GitHubArtifact { .. } => {
            p.warning("GitHub Actions artifacts are ephemeral and expire; this plugin cannot be updated automatically.");
        },
    }

    if request.version.is_some() {
        p.warning("--version only applies to GitGuardian plugins and is ignored.");
    }
    if request.sha256.is_none() && !matches!(resolved, ResolvedSource::LocalFile { .. }) {
        p.warning("No SHA256 checksum provided. Use --sha256 to verify the download.");
    }
}

fn report_failure(p: &mut Printer<'_>, target: &str, error: &PluginError) -> ExitCode {
    match error {
        PluginError::NotEntitled { reason, .. } => {
            p.error(&error.to_string());
            if let Some(reason) = reason {
                p.info(&format!("Reason: {reason}"));
            }
            ExitCode::UsageError
        },
        PluginError::UnknownPlugin(_) => {
            p.error(&error.to_string());
            p.info("Use 'ggshield plugin status' to see available plugins");
            ExitCode::UsageError
        },
        PluginError::InvalidSource(_) => {
            p.error(&error.to_string());
            ExitCode::UsageError
        },
        PluginError::InsecureSource { .. } => {
            p.error(&error.to_string());
            ExitCode::UnexpectedError
        },
        PluginError::SignatureVerification { .. } => {
            let code = fail(p, "install", target, error);
            p.info("Use --allow-unsigned to install it anyway");
            code
        },
        _ => fail(p, "install", target, error),
    }
}
