//! Update and uninstall across the whole plugin lifecycle.

mod common;

use common::Harness;
use ggshield_plugins::error::PluginError;
use ggshield_plugins::installer::PluginInstaller;
use ggshield_plugins::manifest::{PluginManifest, PluginSource};
use ggshield_plugins::signature::SignatureMode;
use ggshield_plugins::update::UpdateChecker;
use ggshield_test::{WheelBuilder, write_bundle};

#[test]
fn update_check_reports_newer_registry_version_without_installing() {
    let h = Harness::new();
    h.serve_catalog(&[("tokenscanner", "1.0.0", true)]);
    h.serve_download("tokenscanner", "1.0.0", true, None);
    h.install("tokenscanner", SignatureMode::Strict).unwrap();

    h.serve_catalog(&[("tokenscanner", "1.1.0", true)]);
    let ctx = h.context();
    let installed = PluginInstaller::from_context(&ctx).list_installed();
    let plan = UpdateChecker::new(&ctx).check(&installed).unwrap();

    assert_eq!(plan.updates.len(), 1);
    let update = &plan.updates[0];
    assert_eq!(update.name, "tokenscanner");
    assert_eq!(update.current_version, "1.0.0");
    assert_eq!(update.latest_version, "1.1.0");
    assert_eq!(update.to_string(), "tokenscanner: 1.0.0 -> 1.1.0 (GitGuardian)");

    let manifest = PluginManifest::load(&h.env.dirs.plugins_dir().join("tokenscanner")).unwrap();
    assert_eq!(manifest.version, "1.0.0");
}

#[test]
fn applying_an_update_replaces_the_wheel_and_records_only_the_version() {
    let h = Harness::new();
    h.serve_catalog(&[("tokenscanner", "1.0.0", true)]);
    h.serve_download("tokenscanner", "1.0.0", true, None);
    h.install("tokenscanner", SignatureMode::Strict).unwrap();

    h.serve_catalog(&[("tokenscanner", "1.1.0", true)]);
    h.serve_download("tokenscanner", "1.1.0", true, None);
    let ctx = h.context();
    let checker = UpdateChecker::new(&ctx);
    let plan = checker
        .check(&PluginInstaller::from_context(&ctx).list_installed())
        .unwrap();

    let mut config = h.config();
    if let Some(record) = config.plugins.get_mut("tokenscanner") {
        record.auto_update = false;
    }
    let mut reported = Vec::new();
    let summary = checker.apply_updates(&plan.updates, SignatureMode::Strict, &mut config, |u, r| {
        reported.push((u.name.clone(), r.is_ok()));
    });
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(reported, vec![("tokenscanner".to_string(), true)]);
    let record = config.get("tokenscanner").unwrap();
    assert_eq!(record.version.as_deref(), Some("1.1.0"));
    assert!(record.enabled);
    assert!(!record.auto_update);

    let dir = h.env.dirs.plugins_dir().join("tokenscanner");
    assert!(dir.join("tokenscanner-1.1.0-py3-none-any.whl").is_file());
    assert!(!dir.join("tokenscanner-1.0.0-py3-none-any.whl").exists());
    assert_eq!(PluginManifest::load(&dir).unwrap().version, "1.1.0");
}

#[test]
fn local_wheels_are_not_updatable_and_need_no_catalog() {
    let h = Harness::new();
    let scratch = h.env.scratch().unwrap();
    let wheel = WheelBuilder::new("localscan", "0.1.0").build(&scratch).unwrap();
    write_bundle(&wheel).unwrap();
    h.install(&wheel.display().to_string(), SignatureMode::Strict).unwrap();

    let ctx = h.context();
    let plan = UpdateChecker::new(&ctx)
        .check(&PluginInstaller::from_context(&ctx).list_installed())
        .unwrap();
    assert!(plan.updates.is_empty());
    assert_eq!(plan.non_updatable.len(), 1);
    assert!(matches!(plan.non_updatable[0].source, PluginSource::LocalFile { .. }));
    assert!(h.http.requests().is_empty());
}

#[test]
fn uninstall_twice_reports_not_installed() {
    let h = Harness::new();
    h.serve_catalog(&[("tokenscanner", "1.0.0", true)]);
    h.serve_download("tokenscanner", "1.0.0", true, None);
    h.install("tokenscanner", SignatureMode::Strict).unwrap();

    let ctx = h.context();
    let installer = PluginInstaller::from_context(&ctx);
    let removed = installer.uninstall("tokenscanner").unwrap();
    assert_eq!(removed.manifest.plugin_name, "tokenscanner");
    assert!(!h.env.dirs.plugins_dir().join("tokenscanner").exists());

    let err = installer.uninstall("tokenscanner").unwrap_err();
    assert!(matches!(err, PluginError::NotInstalled(ref name) if name == "tokenscanner"));
}

#[test]
fn uninstall_rejects_path_like_names() {
    let h = Harness::new();
    let ctx = h.context();
    let err = PluginInstaller::from_context(&ctx).uninstall("../config").unwrap_err();
    assert!(matches!(err, PluginError::InvalidName(_)));
}

fn plant_manifest(h: &Harness, source_type: &str) {
    let dir = h.env.dirs.plugins_dir().join("tokenscanner");
    std::fs::create_dir_all(&dir).unwrap();
    let wheel = WheelBuilder::new("tokenscanner", "1.0.0").build(&dir).unwrap();
    let sha = ggshield_test::sha256_hex(&std::fs::read(&wheel).unwrap());
    let manifest = serde_json::json!({
        "plugin_name": "tokenscanner",
        "version": "1.0.0",
        "wheel_filename": "tokenscanner-1.0.0-py3-none-any.whl",
        "sha256": sha,
        "source": { "type": source_type },
        "installed_at": "2025-03-01T12:00:00+00:00",
    });
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
}

#[test]
fn manifests_with_other_source_types_stay_manageable() {
    for source_type in ["registry_api", "some_future_source"] {
        let h = Harness::new();
        plant_manifest(&h, source_type);
        let ctx = h.context();
        let installer = PluginInstaller::from_context(&ctx);

        let found = installer.find("tokenscanner").expect(source_type);
        assert_eq!(found.manifest.effective_source(), PluginSource::GitGuardianApi);
        assert_eq!(found.enable_key(), "tokenscanner");
        assert_eq!(installer.list_installed().len(), 1);
        assert_eq!(installer.get_installed_version("tokenscanner").as_deref(), Some("1.0.0"));

        installer.uninstall("tokenscanner").unwrap();
        assert!(h.plugin_dirs().is_empty(), "{source_type}: {:?}", h.plugin_dirs());
    }
}
