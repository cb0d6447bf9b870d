//! `inspect-wheel`: show what a plugin wheel declares before installing it.

use std::io::{self, Write};
use std::path::Path;

use ggshield_core::host_version;
use ggshield_plugins::acquire::sha256_file;
use ggshield_plugins::error::PluginResult;
use ggshield_plugins::plugin::{GgshieldPlugin, PluginMetadata};
use ggshield_plugins::registry::{PluginCommand, PluginRegistry};
use ggshield_plugins::signature::find_bundle;
use ggshield_plugins::wheel::{read_entry_point, read_wheel_metadata};

/// Command registered by [`InspectPlugin`].
pub(crate) const INSPECT_COMMAND: &str = "inspect-wheel";

/// Builtin plugin exposing [`INSPECT_COMMAND`].
pub(crate) struct InspectPlugin {
    metadata: PluginMetadata,
}

impl InspectPlugin {
    pub(crate) fn new() -> Self {
        Self {
            metadata: PluginMetadata {
                name: "inspect".to_string(),
                version: host_version().to_string(),
                display_name: "Wheel inspector".to_string(),
                description: "Show the metadata and entry point of a plugin wheel".to_string(),
                min_ggshield_version: host_version().to_string(),
            },
        }
    }

    pub(crate) fn boxed() -> Box<dyn GgshieldPlugin> {
        Box::new(Self::new())
    }
}

impl GgshieldPlugin for InspectPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn register(&self, registry: &mut PluginRegistry) -> PluginResult<()> {
        registry.register_command(PluginCommand::new(
            INSPECT_COMMAND,
            "Show the metadata and entry point of a plugin wheel",
            |args| {
                let Some(path) = args.first() else {
                    let _ = writeln!(io::stderr(), "Usage: ggshield {INSPECT_COMMAND} <wheel>");
                    return Ok(2);
                };
                inspect_wheel(Path::new(path), &mut io::stdout().lock())
            },
        ))
    }
}

/// Describe `wheel` on `out`.
fn inspect_wheel(wheel: &Path, out: &mut impl Write) -> PluginResult<i32> {
    let metadata = read_wheel_metadata(wheel)?;
    let entry_point = read_entry_point(wheel);
    let sha256 = sha256_file(wheel)?;

    writeln!(out, "Name:        {}", metadata.name)?;
    writeln!(out, "Version:     {}", metadata.version)?;
    if let Some(summary) = &metadata.summary {
        writeln!(out, "Summary:     {summary}")?;
    }
    match &entry_point {
        Some(ep) => writeln!(out, "Entry point: {} = {}", ep.name, ep.value)?,
        None => writeln!(out, "Entry point: none (not a ggshield plugin)")?,
    }
    writeln!(out, "SHA-256:     {sha256}")?;
    match find_bundle(wheel) {
        Some(bundle) => writeln!(out, "Signature:   {}", bundle.display())?,
        None => writeln!(out, "Signature:   none")?,
    }

    Ok(i32::from(entry_point.is_none()))
}

#[cfg(test)]
mod tests {
    use ggshield_test::{WheelBuilder, sha256_hex, write_bundle};

    use super::*;

    #[test]
    fn describes_plugin_wheel() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = WheelBuilder::new("tokenscanner", "1.2.0")
            .entry_point("tokenscanner", "tokenscanner.plugin:Plugin")
            .build(tmp.path())
            .unwrap();
        write_bundle(&wheel).unwrap();

        let mut out = Vec::new();
        assert_eq!(inspect_wheel(&wheel, &mut out).unwrap(), 0);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Name:        tokenscanner"));
        assert!(out.contains("Version:     1.2.0"));
        assert!(out.contains("Entry point: tokenscanner = tokenscanner.plugin:Plugin"));
        let sha = sha256_hex(&std::fs::read(&wheel).unwrap());
        assert!(out.contains(&format!("SHA-256:     {sha}")));
        assert!(out.contains(".whl.sigstore"));
    }

    #[test]
    fn wheel_without_entry_point_exits_nonzero() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = WheelBuilder::new("plain", "0.1.0").build(tmp.path()).unwrap();

        let mut out = Vec::new();
        assert_eq!(inspect_wheel(&wheel, &mut out).unwrap(), 1);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Entry point: none (not a ggshield plugin)"));
        assert!(out.contains("Signature:   none"));
    }

    #[test]
    fn unreadable_wheel_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        assert!(inspect_wheel(&tmp.path().join("missing-1.0-py3-none-any.whl"), &mut out).is_err());
        assert!(out.is_empty());
    }
}
