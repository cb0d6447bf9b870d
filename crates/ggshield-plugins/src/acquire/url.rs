//! HTTPS URL and GitHub release asset acquisition.

use tracing::info;

use super::{AcquiredPackage, Acquirer, download_to, ensure_checksum, is_safe_file_name, staging_dir};
use crate::context::PluginContext;
use crate::error::{PluginError, PluginResult};
use crate::manifest::PluginSource;

/// File name used when the URL does not end in a wheel name.
const FALLBACK_FILENAME: &str = "plugin.whl";

/// Which manifest source a URL download is recorded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlKind {
    /// Generic HTTPS URL.
    Plain,
    /// GitHub release asset, with `owner/repo` when known.
    GitHubRelease {
        /// `owner/repo`.
        repo: Option<String>,
    },
}

/// Acquires a wheel from an HTTPS URL.
#[derive(Debug)]
pub struct UrlAcquirer<'a> {
    ctx: &'a PluginContext,
    url: String,
    kind: UrlKind,
    expected_sha256: Option<String>,
}

impl<'a> UrlAcquirer<'a> {
    /// Acquirer for `url`. `expected_sha256`, when given, gates the download.
    #[must_use]
    pub fn new(
        ctx: &'a PluginContext,
        url: String,
        kind: UrlKind,
        expected_sha256: Option<String>,
    ) -> Self {
        Self {
            ctx,
            url,
            kind,
            expected_sha256: expected_sha256.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Last path segment before any query string, if it names a wheel.
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|name| name.ends_with(".whl") && is_safe_file_name(name))
        .unwrap_or(FALLBACK_FILENAME)
        .to_string()
}

impl Acquirer for UrlAcquirer<'_> {
    fn acquire(&self) -> PluginResult<AcquiredPackage> {
        let lower = self.url.to_ascii_lowercase();
        if lower.starts_with("http://") {
            return Err(PluginError::InsecureSource {
                url: self.url.clone(),
            });
        }
        if !lower.starts_with("https://") {
            return Err(PluginError::InvalidSource(format!(
                "Invalid URL scheme: {}",
                self.url
            )));
        }

        let filename = filename_from_url(&self.url);
        let staging = staging_dir()?;
        let (wheel_path, sha256) = download_to(
            self.ctx.http.as_ref(),
            &self.url,
            &[],
            staging.path(),
            &filename,
        )?;
        if let Some(expected) = &self.expected_sha256 {
            ensure_checksum(expected, &sha256)?;
        }

        let source = match &self.kind {
            UrlKind::Plain => PluginSource::Url {
                url: self.url.clone(),
                sha256: Some(sha256.clone()),
            },
            UrlKind::GitHubRelease { repo } => PluginSource::GithubRelease {
                url: self.url.clone(),
                github_repo: repo.clone(),
                sha256: Some(sha256.clone()),
            },
        };

        info!(file = %filename, sha256 = %sha256, "Acquired plugin from URL");

        Ok(AcquiredPackage {
            staging: Some(staging),
            wheel_path,
            wheel_filename: filename,
            sha256,
            expected_sha256: self.expected_sha256.clone(),
            bundle_path: None,
            name: None,
            version: None,
            source,
        })
    }
}
