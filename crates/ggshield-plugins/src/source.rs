//! Classification of user-supplied plugin references.
//!
//! `ggshield plugin install <source>` accepts a registry name, a local wheel,
//! or one of three URL shapes. Classification is pure string matching: no
//! network or filesystem access happens here.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PluginError, PluginResult};

static ARTIFACT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/actions/runs/(\d+)/artifacts/(\d+)/?$")
        .expect("invalid regex")
});

static GITHUB_REPO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/")
        .expect("invalid regex")
});

static URL_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("invalid regex")
});

/// A classified plugin reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Plugin name resolved through the GitGuardian registry.
    Registry {
        /// Catalog name.
        name: String,
    },
    /// Wheel on the local filesystem.
    LocalFile {
        /// Path as given.
        path: PathBuf,
    },
    /// Arbitrary URL.
    Url {
        /// The URL.
        url: String,
    },
    /// Asset attached to a GitHub release.
    GitHubRelease {
        /// The asset URL.
        url: String,
        /// `owner/repo` when the URL is on github.com.
        repo: Option<String>,
    },
    /// Artifact produced by a GitHub Actions run.
    GitHubArtifact {
        /// The artifact page URL.
        url: String,
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// Artifact ID.
        artifact_id: String,
    },
}

impl ResolvedSource {
    /// Short name of the source kind, for messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Registry { .. } => "GitGuardian",
            Self::LocalFile { .. } => "local file",
            Self::Url { .. } => "URL",
            Self::GitHubRelease { .. } => "GitHub release",
            Self::GitHubArtifact { .. } => "GitHub artifact",
        }
    }
}

/// Classify `input`, most specific shape first.
///
/// # Errors
///
/// Returns [`PluginError::InvalidSource`] for an empty string or a URL with a
/// scheme other than `http`/`https`.
pub fn resolve_source(input: &str) -> PluginResult<ResolvedSource> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PluginError::InvalidSource(
            "Plugin source cannot be empty".to_string(),
        ));
    }

    if let Some(caps) = ARTIFACT_URL.captures(input) {
        return Ok(ResolvedSource::GitHubArtifact {
            url: input.to_string(),
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            artifact_id: caps[4].to_string(),
        });
    }

    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        if input.contains("/releases/download/") {
            return Ok(ResolvedSource::GitHubRelease {
                url: input.to_string(),
                repo: github_repo_from_url(input),
            });
        }
        return Ok(ResolvedSource::Url {
            url: input.to_string(),
        });
    }

    if URL_SCHEME.is_match(input) {
        return Err(PluginError::InvalidSource(format!(
            "Invalid URL scheme: {input}"
        )));
    }

    if input.ends_with(".whl") {
        return Ok(ResolvedSource::LocalFile {
            path: PathBuf::from(input),
        });
    }

    Ok(ResolvedSource::Registry {
        name: input.to_string(),
    })
}

/// `owner/repo` from a `https://github.com/{owner}/{repo}/...` URL.
#[must_use]
pub fn github_repo_from_url(url: &str) -> Option<String> {
    GITHUB_REPO
        .captures(url)
        .map(|caps| format!("{}/{}", &caps[1], &caps[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_url_wins_over_everything() {
        let src =
            resolve_source("https://github.com/acme/scanner/actions/runs/123/artifacts/456").unwrap();
        assert_eq!(
            src,
            ResolvedSource::GitHubArtifact {
                url: "https://github.com/acme/scanner/actions/runs/123/artifacts/456".into(),
                owner: "acme".into(),
                repo: "scanner".into(),
                artifact_id: "456".into(),
            }
        );
    }

    #[test]
    fn release_url() {
        let src = resolve_source(
            "https://github.com/acme/scanner/releases/download/v1.2.0/scanner-1.2.0-py3-none-any.whl",
        )
        .unwrap();
        match src {
            ResolvedSource::GitHubRelease { repo, .. } => {
                assert_eq!(repo.as_deref(), Some("acme/scanner"));
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn release_path_off_github_has_no_repo() {
        let src =
            resolve_source("https://mirror.example.com/releases/download/x/p-1.0-py3-none-any.whl")
                .unwrap();
        assert_eq!(
            src,
            ResolvedSource::GitHubRelease {
                url: "https://mirror.example.com/releases/download/x/p-1.0-py3-none-any.whl".into(),
                repo: None,
            }
        );
    }

    #[test]
    fn generic_urls_including_http() {
        assert!(matches!(
            resolve_source("https://example.com/plugin.whl").unwrap(),
            ResolvedSource::Url { .. }
        ));
        // Rejected later by the URL acquirer, before any request.
        assert!(matches!(
            resolve_source("http://example.com/plugin.whl").unwrap(),
            ResolvedSource::Url { .. }
        ));
    }

    #[test]
    fn other_schemes_are_errors() {
        let err = resolve_source("ftp://example.com/plugin.whl").unwrap_err();
        assert_eq!(err.to_string(), "Invalid URL scheme: ftp://example.com/plugin.whl");
        assert!(resolve_source("file:///tmp/x.whl").is_err());
    }

    #[test]
    fn local_wheel_without_filesystem_check() {
        assert_eq!(
            resolve_source("./dist/does-not-exist-1.0-py3-none-any.whl").unwrap(),
            ResolvedSource::LocalFile {
                path: PathBuf::from("./dist/does-not-exist-1.0-py3-none-any.whl")
            }
        );
    }

    #[test]
    fn fallback_is_registry_name() {
        assert_eq!(
            resolve_source("tokenscanner").unwrap(),
            ResolvedSource::Registry {
                name: "tokenscanner".into()
            }
        );
    }

    #[test]
    fn empty_is_error() {
        assert!(resolve_source("   ").is_err());
    }
}
