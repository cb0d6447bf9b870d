//! GitHub Actions artifact acquisition.
//!
//! Artifacts are zip files wrapping the wheel. Downloading one requires a
//! token even for public repositories.

use std::fs::File;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::{
    AcquiredPackage, Acquirer, download_to, ensure_checksum, is_safe_file_name, staging_dir,
    write_hashed,
};
use crate::context::{GITHUB_TOKEN_ENV_VAR, PluginContext};
use crate::error::{PluginError, PluginResult};
use crate::http::MAX_DOWNLOAD_SIZE;
use crate::manifest::PluginSource;
use crate::process::run_with_timeout;

const GH_TIMEOUT: Duration = Duration::from_secs(5);

/// GitHub REST API version header value.
pub(crate) const GITHUB_API_VERSION: &str = "2022-11-28";

const AUTH_REQUIRED: &str = "GitHub authentication required. Set GITHUB_TOKEN environment variable or install and authenticate with GitHub CLI (gh auth login).";

/// Resolve a GitHub token: explicit context token, then `GITHUB_TOKEN`, then
/// `gh auth token`.
#[must_use]
pub fn resolve_github_token(ctx: &PluginContext) -> Option<String> {
    ctx.github_token
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| {
            std::env::var(GITHUB_TOKEN_ENV_VAR)
                .ok()
                .filter(|t| !t.trim().is_empty())
        })
        .or_else(gh_cli_token)
}

fn gh_cli_token() -> Option<String> {
    let gh = which::which("gh").ok()?;
    match run_with_timeout(Command::new(gh).args(["auth", "token"]), GH_TIMEOUT) {
        Ok(Some(output)) if output.status.success() => {
            Some(output.stdout.trim().to_string()).filter(|t| !t.is_empty())
        },
        Ok(Some(output)) => {
            debug!(stderr = %output.stderr.trim(), "gh auth token failed");
            None
        },
        Ok(None) => {
            warn!("gh auth token timed out");
            None
        },
        Err(e) => {
            debug!(error = %e, "Failed to run gh");
            None
        },
    }
}

/// Acquires the wheel inside a GitHub Actions artifact.
#[derive(Debug)]
pub struct ArtifactAcquirer<'a> {
    ctx: &'a PluginContext,
    url: String,
    owner: String,
    repo: String,
    artifact_id: String,
    expected_sha256: Option<String>,
}

impl<'a> ArtifactAcquirer<'a> {
    /// Acquirer for artifact `artifact_id` of `owner/repo`.
    #[must_use]
    pub fn new(
        ctx: &'a PluginContext,
        url: String,
        owner: String,
        repo: String,
        artifact_id: String,
        expected_sha256: Option<String>,
    ) -> Self {
        Self {
            ctx,
            url,
            owner,
            repo,
            artifact_id,
            expected_sha256: expected_sha256.filter(|s| !s.trim().is_empty()),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/actions/artifacts/{}/zip",
            self.ctx.github_api_url, self.owner, self.repo, self.artifact_id
        )
    }
}

impl Acquirer for ArtifactAcquirer<'_> {
    fn acquire(&self) -> PluginResult<AcquiredPackage> {
        let token = resolve_github_token(self.ctx)
            .ok_or_else(|| PluginError::GitHubArtifact(AUTH_REQUIRED.to_string()))?;

        let headers = [
            ("Authorization", format!("Bearer {token}")),
            ("Accept", "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version", GITHUB_API_VERSION.to_string()),
        ];

        let staging = staging_dir()?;
        let (zip_path, _) = download_to(
            self.ctx.http.as_ref(),
            &self.api_url(),
            &headers,
            staging.path(),
            "artifact.zip",
        )
        .map_err(|e| PluginError::GitHubArtifact(format!("Failed to download artifact: {e}")))?;

        let (wheel_filename, sha256) = extract_first_wheel(&zip_path, staging.path())?;
        if let Some(expected) = &self.expected_sha256 {
            ensure_checksum(expected, &sha256)?;
        }

        info!(
            repo = %format!("{}/{}", self.owner, self.repo),
            artifact = %self.artifact_id,
            file = %wheel_filename,
            "Acquired plugin from GitHub artifact"
        );

        Ok(AcquiredPackage {
            wheel_path: staging.path().join(&wheel_filename),
            staging: Some(staging),
            wheel_filename,
            sha256: sha256.clone(),
            expected_sha256: self.expected_sha256.clone(),
            bundle_path: None,
            name: None,
            version: None,
            source: PluginSource::GithubArtifact {
                url: self.url.clone(),
                github_repo: Some(format!("{}/{}", self.owner, self.repo)),
                sha256: Some(sha256),
            },
        })
    }
}

/// Copy the first `.whl` member of the artifact zip into `dest_dir`.
fn extract_first_wheel(zip_path: &Path, dest_dir: &Path) -> PluginResult<(String, String)> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| PluginError::GitHubArtifact(format!("Failed to extract artifact: {e}")))?;

    let wheels: Vec<String> = archive
        .file_names()
        .filter(|name| name.ends_with(".whl") && !name.ends_with('/'))
        .map(String::from)
        .collect();
    let Some(member) = wheels.first() else {
        return Err(PluginError::GitHubArtifact(
            "No wheel file found in artifact".to_string(),
        ));
    };
    if wheels.len() > 1 {
        warn!(wheel = %member, "Multiple wheel files found in artifact, using first");
    }

    let filename = member.rsplit('/').next().unwrap_or(member).to_string();
    if !is_safe_file_name(&filename) {
        return Err(PluginError::PathTraversal {
            path: member.clone(),
        });
    }

    let mut entry = archive
        .by_name(member)
        .map_err(|e| PluginError::GitHubArtifact(format!("Failed to extract artifact: {e}")))?;
    let sha256 = write_hashed(&mut entry, &dest_dir.join(&filename), MAX_DOWNLOAD_SIZE)?;
    Ok((filename, sha256))
}
