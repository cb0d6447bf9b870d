//! Shared dependencies for plugin operations.

use std::fmt;
use std::sync::Arc;

use ggshield_core::{GgshieldDirs, PlatformInfo};

use crate::http::HttpClient;
use crate::signature::SignatureVerifier;

/// Default GitGuardian API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.gitguardian.com";

/// Environment variable holding a GitHub token for artifact downloads and
/// release checks.
pub const GITHUB_TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Everything the acquirers, installer, loader and update checker need.
///
/// Built once per CLI invocation and passed by reference.
#[derive(Clone)]
pub struct PluginContext {
    /// Resolved ggshield directories.
    pub dirs: GgshieldDirs,
    /// HTTP transport.
    pub http: Arc<dyn HttpClient>,
    /// GitGuardian API base URL, without trailing slash.
    pub api_url: String,
    /// GitGuardian API key.
    pub api_key: Option<String>,
    /// Host platform triple.
    pub platform: PlatformInfo,
    /// Signature verifier.
    pub verifier: Arc<SignatureVerifier>,
    /// Explicit GitHub token; when `None` it is resolved lazily.
    pub github_token: Option<String>,
    /// Base URL of the GitHub REST API.
    pub github_api_url: String,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("dirs", &self.dirs)
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("platform", &self.platform)
            .field("github_api_url", &self.github_api_url)
            .finish_non_exhaustive()
    }
}

impl PluginContext {
    /// Context with default endpoints, detected platform and Sigstore verifier.
    #[must_use]
    pub fn new(dirs: GgshieldDirs, http: Arc<dyn HttpClient>) -> Self {
        Self {
            dirs,
            http,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            platform: PlatformInfo::detect(),
            verifier: Arc::new(SignatureVerifier::default()),
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
        }
    }

    /// Set the GitGuardian endpoint and key.
    #[must_use]
    pub fn with_api(mut self, url: impl Into<String>, key: Option<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Override the platform triple.
    #[must_use]
    pub fn with_platform(mut self, platform: PlatformInfo) -> Self {
        self.platform = platform;
        self
    }

    /// Override the signature verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    /// Provide a GitHub token up front.
    #[must_use]
    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into());
        self
    }

    /// Override the GitHub REST API base URL.
    #[must_use]
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into().trim_end_matches('/').to_string();
        self
    }
}
