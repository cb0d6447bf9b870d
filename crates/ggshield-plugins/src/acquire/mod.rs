//! Acquisition: turning a [`ResolvedSource`] into a staged wheel.
//!
//! Each source kind has its own [`Acquirer`]. Downloads land in a private
//! staging directory and are hashed while they stream, so a checksum mismatch
//! is detected before anything touches the plugins directory.

mod github;
mod local;
mod registry;
mod url;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tempfile::TempDir;

pub(crate) use self::github::GITHUB_API_VERSION;
pub use self::github::{ArtifactAcquirer, resolve_github_token};
pub use self::local::LocalAcquirer;
pub use self::registry::RegistryAcquirer;
pub use self::url::{UrlAcquirer, UrlKind};
use crate::context::PluginContext;
use crate::error::{PluginError, PluginResult};
use crate::http::{Headers, HttpClient, MAX_DOWNLOAD_SIZE, redact_query};
use crate::manifest::PluginSource;
use crate::source::ResolvedSource;

/// A wheel ready for the installer.
#[derive(Debug)]
pub struct AcquiredPackage {
    /// Keeps downloaded files alive until installation completes.
    staging: Option<TempDir>,
    /// Staged (or local) wheel.
    pub wheel_path: PathBuf,
    /// File name to install the wheel under.
    pub wheel_filename: String,
    /// Lowercase hex SHA-256 of the staged bytes.
    pub sha256: String,
    /// Checksum the bytes were required to match, if any.
    pub expected_sha256: Option<String>,
    /// Staged signature bundle.
    pub bundle_path: Option<PathBuf>,
    /// Plugin name known up front (registry installs).
    pub name: Option<String>,
    /// Version known up front (registry installs).
    pub version: Option<String>,
    /// Origin to record in the manifest.
    pub source: PluginSource,
}

impl AcquiredPackage {
    /// Whether the wheel lives in a private staging directory.
    #[must_use]
    pub fn is_staged(&self) -> bool {
        self.staging.is_some()
    }
}

/// Produces an [`AcquiredPackage`] from one kind of source.
pub trait Acquirer {
    /// Fetch (or locate) the wheel and stage it.
    ///
    /// # Errors
    ///
    /// Returns source-specific failures: network and download errors,
    /// [`PluginError::ChecksumMismatch`], [`PluginError::NotAvailable`],
    /// [`PluginError::InvalidSource`] or [`PluginError::InsecureSource`].
    fn acquire(&self) -> PluginResult<AcquiredPackage>;
}

/// Options carried from the command line into acquisition.
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// Registry version to request (latest if `None`).
    pub version: Option<String>,
    /// Expected SHA-256 for non-registry sources.
    pub sha256: Option<String>,
}

/// Pick the acquirer for `source`.
#[must_use]
pub fn acquirer_for<'a>(
    source: &ResolvedSource,
    ctx: &'a PluginContext,
    options: &AcquireOptions,
) -> Box<dyn Acquirer + 'a> {
    match source {
        ResolvedSource::Registry { name } => Box::new(RegistryAcquirer::new(
            ctx,
            name.clone(),
            options.version.clone(),
        )),
        ResolvedSource::LocalFile { path } => {
            Box::new(LocalAcquirer::new(path.clone(), options.sha256.clone()))
        },
        ResolvedSource::Url { url } => Box::new(UrlAcquirer::new(
            ctx,
            url.clone(),
            UrlKind::Plain,
            options.sha256.clone(),
        )),
        ResolvedSource::GitHubRelease { url, repo } => Box::new(UrlAcquirer::new(
            ctx,
            url.clone(),
            UrlKind::GitHubRelease { repo: repo.clone() },
            options.sha256.clone(),
        )),
        ResolvedSource::GitHubArtifact {
            url,
            owner,
            repo,
            artifact_id,
        } => Box::new(ArtifactAcquirer::new(
            ctx,
            url.clone(),
            owner.clone(),
            repo.clone(),
            artifact_id.clone(),
            options.sha256.clone(),
        )),
    }
}

/// Private staging directory for one acquisition.
fn staging_dir() -> PluginResult<TempDir> {
    tempfile::Builder::new()
        .prefix("ggshield-plugin-")
        .tempdir()
        .map_err(PluginError::Io)
}

/// `Write` adapter that hashes everything passing through.
pub(crate) struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Lowercase hex digest and the inner writer.
    pub(crate) fn finish(self) -> (String, W) {
        (hex::encode(self.hasher.finalize()), self.inner)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(written) = buf.get(..n) {
            self.hasher.update(written);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy `reader` into a new file at `dest`, returning its SHA-256.
pub(crate) fn write_hashed(reader: &mut impl Read, dest: &Path, limit: u64) -> PluginResult<String> {
    let file = File::create(dest)?;
    let mut writer = HashingWriter::new(file);
    let copied = io::copy(&mut reader.take(limit.saturating_add(1)), &mut writer)?;
    if copied > limit {
        return Err(PluginError::PackageTooLarge {
            size: copied,
            limit,
        });
    }
    let (digest, file) = writer.finish();
    file.sync_all()?;
    Ok(digest)
}

/// SHA-256 of a file on disk.
///
/// # Errors
///
/// Returns [`PluginError::Io`] if the file cannot be read.
pub fn sha256_file(path: &Path) -> PluginResult<String> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Case-insensitive, constant-time digest comparison.
#[must_use]
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    let expected = expected.trim().to_ascii_lowercase();
    let actual = actual.trim().to_ascii_lowercase();
    expected.len() == actual.len() && bool::from(expected.as_bytes().ct_eq(actual.as_bytes()))
}

/// Fail with [`PluginError::ChecksumMismatch`] unless the digests match.
///
/// # Errors
///
/// See above.
pub fn ensure_checksum(expected: &str, actual: &str) -> PluginResult<()> {
    if checksums_match(expected, actual) {
        Ok(())
    } else {
        Err(PluginError::ChecksumMismatch {
            expected: expected.trim().to_ascii_lowercase(),
            actual: actual.to_ascii_lowercase(),
        })
    }
}

/// GET `url` into `dir/filename`, hashing as it streams.
fn download_to(
    http: &dyn HttpClient,
    url: &str,
    headers: Headers<'_>,
    dir: &Path,
    filename: &str,
) -> PluginResult<(PathBuf, String)> {
    tracing::info!(url = %redact_query(url), file = %filename, "Downloading");

    let response = http.get(url, headers)?;
    if !response.is_success() {
        return Err(PluginError::Download(format!(
            "HTTP {} from {}",
            response.status,
            redact_query(url)
        )));
    }

    let dest = dir.join(filename);
    let file = File::create(&dest)?;
    let mut writer = HashingWriter::new(file);
    response.copy_to(&mut writer, MAX_DOWNLOAD_SIZE)?;
    let (digest, file) = writer.finish();
    file.sync_all()?;
    Ok((dest, digest))
}

/// Whether `name` is usable as a single path component.
#[must_use]
pub fn is_safe_file_name(name: &str) -> bool {
    !(name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_comparison_ignores_case() {
        let digest = "AbCdEf0123";
        assert!(checksums_match(digest, "abcdef0123"));
        assert!(checksums_match(" abcdef0123\n", digest));
        assert!(!checksums_match(digest, "abcdef012"));
        assert!(!checksums_match(digest, "abcdef0124"));
    }

    #[test]
    fn ensure_checksum_reports_both_digests() {
        let err = ensure_checksum(&"a".repeat(64), &"b".repeat(64)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: expected aaaaaaaaaaaaaaaa..., got bbbbbbbbbbbbbbbb..."
        );
    }

    #[test]
    fn hashing_writer_matches_file_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("x.whl");
        let digest = write_hashed(&mut &b"hello"[..], &dest, 16).unwrap();
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(sha256_file(&dest).unwrap(), digest);
    }

    #[test]
    fn write_hashed_enforces_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let err = write_hashed(&mut &[0u8; 32][..], &tmp.path().join("x"), 8).unwrap_err();
        assert!(matches!(err, PluginError::PackageTooLarge { limit: 8, .. }));
    }

    #[test]
    fn unsafe_file_names() {
        for name in ["", ".", "..", "a/b", "a\\b", "a\0b"] {
            assert!(!is_safe_file_name(name), "{name:?}");
        }
        assert!(is_safe_file_name("tokenscanner-1.0.0-py3-none-any.whl"));
    }
}
