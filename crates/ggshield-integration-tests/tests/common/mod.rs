//! Shared harness for plugin lifecycle tests.

use std::sync::Arc;

use ggshield_plugins::acquire::{AcquireOptions, acquirer_for};
use ggshield_plugins::context::PluginContext;
use ggshield_plugins::enterprise_config::EnterpriseConfig;
use ggshield_plugins::error::PluginResult;
use ggshield_plugins::installer::{InstallOutcome, PluginInstaller};
use ggshield_plugins::signature::SignatureMode;
use ggshield_plugins::source::resolve_source;
use ggshield_test::{
    FakeHttp, StaticOracle, TEST_API_URL, TestEnv, WheelBuilder, bundle_json, catalog_json,
    download_info_json, sha256_hex,
};

/// Catalog endpoint served by [`Harness`].
#[allow(dead_code)]
pub const CATALOG_URL: &str = "https://api.gitguardian.test/v1/plugins";

/// Entry-point value declared by wheels served from the harness.
#[allow(dead_code)]
pub fn plugin_symbol(name: &str) -> String {
    format!("{name}.plugin:Plugin")
}

/// An isolated home, a routed fake HTTP client and an accepting oracle.
#[allow(dead_code)]
pub struct Harness {
    /// Temporary ggshield home.
    pub env: TestEnv,
    /// Fake transport shared with every context.
    pub http: FakeHttp,
    /// Oracle shared with every context.
    pub oracle: StaticOracle,
}

#[allow(dead_code)]
impl Harness {
    /// Fresh harness accepting every signature.
    pub fn new() -> Self {
        Self::with_oracle(StaticOracle::accept())
    }

    /// Fresh harness with a specific oracle.
    pub fn with_oracle(oracle: StaticOracle) -> Self {
        ggshield_test::init_test_logging();
        Self {
            env: TestEnv::new().expect("failed to create test home"),
            http: FakeHttp::new(),
            oracle,
        }
    }

    /// Context wired to the harness transport and oracle.
    pub fn context(&self) -> PluginContext {
        self.env.context(&self.http, Arc::new(self.oracle.clone()))
    }

    /// Serve a catalog listing `(name, latest, available)` entries.
    pub fn serve_catalog(&self, plugins: &[(&str, &str, bool)]) {
        self.http
            .respond(CATALOG_URL, 200, catalog_json(plugins).to_string());
    }

    /// Serve `name` at `version` from the download endpoint, optionally
    /// with a signature bundle. `advertised_sha` overrides the checksum the
    /// registry announces.
    pub fn serve_download(
        &self,
        name: &str,
        version: &str,
        signed: bool,
        advertised_sha: Option<&str>,
    ) -> Vec<u8> {
        let wheel = WheelBuilder::new(name, version).entry_point(name, &plugin_symbol(name));
        let bytes = wheel.to_bytes().expect("failed to build wheel");
        let filename = wheel.filename();
        let url = format!("https://cdn.gitguardian.test/{filename}");
        let sig_url = format!("{url}.sigstore");
        let sha = advertised_sha.map_or_else(|| sha256_hex(&bytes), str::to_string);

        self.http.respond(
            format!("{TEST_API_URL}/v1/plugins/{name}/download"),
            200,
            download_info_json(&url, &filename, &sha, version, signed.then_some(sig_url.as_str()))
                .to_string(),
        );
        self.http.respond(url, 200, bytes.clone());
        if signed {
            self.http.respond(sig_url, 200, bundle_json());
        }
        bytes
    }

    /// Resolve, acquire and install `source`, then record it as enabled the
    /// way the `plugin install` command does.
    pub fn install(&self, source: &str, mode: SignatureMode) -> PluginResult<InstallOutcome> {
        let ctx = self.context();
        let resolved = resolve_source(source)?;
        let package = acquirer_for(&resolved, &ctx, &AcquireOptions::default()).acquire()?;
        let outcome = PluginInstaller::from_context(&ctx).install(&package, mode)?;
        EnterpriseConfig::update(&ctx.dirs.enterprise_config_path(), |config| {
            config.enable_plugin(&outcome.enable_key, Some(&outcome.version));
        })?;
        Ok(outcome)
    }

    /// Current enablement config.
    pub fn config(&self) -> EnterpriseConfig {
        EnterpriseConfig::load_or_default(&self.env.dirs.enterprise_config_path())
            .expect("failed to load config")
    }

    /// Names of the entries in the plugins directory.
    pub fn plugin_dirs(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.env.dirs.plugins_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
