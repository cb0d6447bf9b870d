//! Test fixtures: wheels, bundles, API payloads and an isolated home.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ggshield_core::{GgshieldDirs, PlatformInfo};
use ggshield_plugins::context::PluginContext;
use ggshield_plugins::signature::{SignatureVerifier, TrustOracle};
use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use crate::mocks::FakeHttp;

/// Builds minimal, valid wheel archives.
#[derive(Debug, Clone)]
pub struct WheelBuilder {
    name: String,
    version: String,
    tag: String,
    entry_point: Option<(String, String)>,
    extra: Vec<(String, Vec<u8>)>,
}

impl WheelBuilder {
    /// Wheel for distribution `name` at `version`, tagged `py3-none-any`.
    #[must_use]
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            tag: "py3-none-any".to_string(),
            entry_point: None,
            extra: Vec::new(),
        }
    }

    /// Declare a `ggshield.plugins` entry point.
    #[must_use]
    pub fn entry_point(mut self, name: &str, value: &str) -> Self {
        self.entry_point = Some((name.to_string(), value.to_string()));
        self
    }

    /// Replace the `{python}-{abi}-{platform}` tag.
    #[must_use]
    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    /// Add an arbitrary archive member.
    #[must_use]
    pub fn file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.extra.push((path.to_string(), contents.into()));
        self
    }

    /// File name the wheel is written under.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}-{}-{}.whl", self.name, self.version, self.tag)
    }

    /// Archive bytes.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the archive cannot be written.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        let dist_info = format!("{}-{}.dist-info", self.name, self.version);

        zip.start_file(format!("{}/__init__.py", self.name), opts)
            .map_err(io::Error::other)?;
        zip.write_all(b"")?;

        zip.start_file(format!("{dist_info}/METADATA"), opts)
            .map_err(io::Error::other)?;
        write!(
            zip,
            "Metadata-Version: 2.1\nName: {}\nVersion: {}\nSummary: {} plugin\n",
            self.name, self.version, self.name
        )?;

        if let Some((ep_name, ep_value)) = &self.entry_point {
            zip.start_file(format!("{dist_info}/entry_points.txt"), opts)
                .map_err(io::Error::other)?;
            write!(zip, "[ggshield.plugins]\n{ep_name} = {ep_value}\n")?;
        }

        for (path, contents) in &self.extra {
            zip.start_file(path.as_str(), opts).map_err(io::Error::other)?;
            zip.write_all(contents)?;
        }

        let cursor = zip.finish().map_err(io::Error::other)?;
        Ok(cursor.into_inner())
    }

    /// Write the wheel into `dir`, returning its path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the archive cannot be written.
    pub fn build(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(self.filename());
        std::fs::write(&path, self.to_bytes()?)?;
        Ok(path)
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Minimal well-formed sigstore bundle body.
#[must_use]
pub fn bundle_json() -> String {
    json!({
        "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
        "verificationMaterial": {},
        "messageSignature": {}
    })
    .to_string()
}

/// Write `{wheel}.sigstore` next to `wheel`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_bundle(wheel: &Path) -> io::Result<PathBuf> {
    let mut name = wheel.as_os_str().to_os_string();
    name.push(".sigstore");
    let path = PathBuf::from(name);
    std::fs::write(&path, bundle_json())?;
    Ok(path)
}

/// Catalog response listing `(name, latest_version, available)` entries.
#[must_use]
pub fn catalog_json(plugins: &[(&str, &str, bool)]) -> serde_json::Value {
    let plugins: Vec<_> = plugins
        .iter()
        .map(|(name, version, available)| {
            json!({
                "name": name,
                "display_name": name,
                "description": format!("{name} plugin"),
                "available": available,
                "latest_version": version,
                "supported_platforms": [],
                "reason": if *available { serde_json::Value::Null } else { json!("Requires Business plan") },
            })
        })
        .collect();
    json!({
        "account": { "plan": "business", "features": { "plugins": true } },
        "plugins": plugins,
    })
}

/// Download-info response.
#[must_use]
pub fn download_info_json(
    download_url: &str,
    filename: &str,
    sha256: &str,
    version: &str,
    signature_url: Option<&str>,
) -> serde_json::Value {
    json!({
        "download_url": download_url,
        "filename": filename,
        "sha256": sha256,
        "version": version,
        "expires_at": "2099-01-01T00:00:00Z",
        "signature_url": signature_url,
    })
}

/// API base URL used by [`TestEnv`] contexts.
pub const TEST_API_URL: &str = "https://api.gitguardian.test";

/// GitHub API base URL used by [`TestEnv`] contexts.
pub const TEST_GITHUB_API_URL: &str = "https://api.github.test";

/// An isolated ggshield home in a temporary directory.
#[derive(Debug)]
pub struct TestEnv {
    root: TempDir,
    /// Directories rooted in the temporary home.
    pub dirs: GgshieldDirs,
}

impl TestEnv {
    /// Fresh, empty home.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the temporary directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let root = tempfile::tempdir()?;
        let dirs = GgshieldDirs::from_path(root.path());
        Ok(Self { root, dirs })
    }

    /// Root of the temporary home.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Scratch directory outside the plugins tree.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn scratch(&self) -> io::Result<PathBuf> {
        let dir = self.root.path().join("scratch");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Plugin context wired to `http` and `oracle`, on a fixed linux x86_64 platform.
    #[must_use]
    pub fn context(&self, http: &FakeHttp, oracle: Arc<dyn TrustOracle>) -> PluginContext {
        PluginContext::new(self.dirs.clone(), http.shared())
            .with_api(TEST_API_URL, Some("test-key".to_string()))
            .with_platform(PlatformInfo::new("linux", "x86_64", "cp312"))
            .with_verifier(SignatureVerifier::new(oracle))
            .with_github_token("gh-test-token")
            .with_github_api_url(TEST_GITHUB_API_URL)
    }
}
