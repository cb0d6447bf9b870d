//! Identity-based signature verification for plugin wheels.
//!
//! Wheels are signed keylessly with sigstore by a GitHub Actions workflow.
//! A wheel is trusted when its bundle verifies under an OIDC identity policy:
//! the certificate issuer AND the workflow repository must both match one of
//! the configured [`TrustedIdentity`] entries.
//!
//! The cryptographic check sits behind [`TrustOracle`]. The shipped
//! [`SigstoreOracle`] verifies bundles in-process with the `sigstore` crate
//! and fails closed when the trust root cannot be loaded.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sigstore::bundle::verify::blocking::Verifier;
use sigstore::bundle::verify::policy::{self, SingleX509ExtPolicy};
use tracing::{debug, info, warn};

use crate::error::{PluginError, PluginResult};

/// OIDC issuer of GitHub Actions tokens.
pub const GITHUB_ACTIONS_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Bundle file suffixes, in lookup order.
pub const BUNDLE_SUFFIXES: [&str; 2] = [".sigstore", ".sigstore.json"];

/// How strictly to enforce plugin signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureMode {
    /// Block unsigned or invalid plugins.
    #[default]
    Strict,
    /// Log a warning but allow the plugin.
    Warn,
    /// Skip verification entirely.
    Disabled,
}

impl SignatureMode {
    /// Lowercase name as stored in config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Warn => "warn",
            Self::Disabled => "disabled",
        }
    }

    /// Mode used with `--allow-unsigned`: strict becomes warn, others are kept.
    #[must_use]
    pub fn allow_unsigned(self) -> Self {
        match self {
            Self::Strict => Self::Warn,
            other => other,
        }
    }
}

impl FromStr for SignatureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "warn" => Ok(Self::Warn),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("invalid signature mode: {other}")),
        }
    }
}

impl fmt::Display for SignatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying a wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStatus {
    /// A trusted identity signed the wheel.
    Valid,
    /// No bundle was found.
    Missing,
    /// A bundle exists but no trusted identity matched.
    Invalid,
    /// Verification was disabled.
    Skipped,
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Missing => "missing",
            Self::Invalid => "invalid",
            Self::Skipped => "skipped",
        })
    }
}

/// An OIDC identity trusted to sign plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedIdentity {
    /// GitHub repository (`GitGuardian/satori`).
    pub repository: String,
    /// OIDC issuer URL.
    pub issuer: String,
}

impl TrustedIdentity {
    /// Identity for a GitHub Actions workflow in `repository`.
    #[must_use]
    pub fn github_actions(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            issuer: GITHUB_ACTIONS_ISSUER.to_string(),
        }
    }
}

/// Identities trusted out of the box.
#[must_use]
pub fn default_trusted_identities() -> Vec<TrustedIdentity> {
    vec![TrustedIdentity::github_actions("GitGuardian/satori")]
}

/// Verification result, also persisted in the plugin manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    /// Verification status.
    pub status: SignatureStatus,
    /// Repository of the matching identity (valid only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Human-readable detail (missing/invalid).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SignatureInfo {
    fn with_status(status: SignatureStatus) -> Self {
        Self {
            status,
            identity: None,
            message: None,
        }
    }

    /// Label for listings: `valid (GitGuardian/satori)`, `missing`, ...
    #[must_use]
    pub fn label(&self) -> String {
        match &self.identity {
            Some(identity) => format!("{} ({identity})", self.status),
            None => self.status.to_string(),
        }
    }
}

/// Cryptographic check of an artifact against a sigstore bundle.
pub trait TrustOracle: Send + Sync {
    /// Verify `artifact` against `bundle` under `identity`'s policy.
    ///
    /// # Errors
    ///
    /// Returns a description of why the identity did not match.
    fn verify(&self, artifact: &Path, bundle: &Path, identity: &TrustedIdentity)
    -> Result<(), String>;
}

/// [`TrustOracle`] backed by the `sigstore` crate.
///
/// Checks the bundle against the public-good Sigstore trust root. The
/// verifier is built on each call, so a trust root that cannot be fetched
/// fails that verification only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigstoreOracle;

impl SigstoreOracle {
    /// Oracle using the production trust root.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TrustOracle for SigstoreOracle {
    fn verify(
        &self,
        artifact: &Path,
        bundle: &Path,
        identity: &TrustedIdentity,
    ) -> Result<(), String> {
        let raw = std::fs::read(bundle).map_err(|e| format!("failed to read bundle: {e}"))?;
        let bundle: sigstore::bundle::Bundle =
            serde_json::from_slice(&raw).map_err(|e| format!("unreadable bundle: {e}"))?;
        let input = File::open(artifact).map_err(|e| format!("failed to open artifact: {e}"))?;

        let issuer = policy::OIDCIssuer::new(&identity.issuer);
        let repository = policy::GitHubWorkflowRepository::new(&identity.repository);
        let policy = policy::AllOf::new([
            &issuer as &dyn policy::VerificationPolicy,
            &repository as &dyn policy::VerificationPolicy,
        ])
        .ok_or_else(|| "empty identity policy".to_string())?;

        let verifier = Verifier::production()
            .map_err(|e| format!("failed to load sigstore trust root: {e}"))?;
        verifier
            .verify(input, bundle, &policy, true)
            .map_err(|e| e.to_string())
    }
}

/// Return the bundle next to `wheel`, checking `.sigstore` then `.sigstore.json`.
#[must_use]
pub fn find_bundle(wheel: &Path) -> Option<PathBuf> {
    let name = wheel.file_name()?.to_string_lossy().into_owned();
    BUNDLE_SUFFIXES
        .iter()
        .map(|suffix| wheel.with_file_name(format!("{name}{suffix}")))
        .find(|candidate| candidate.is_file())
}

/// Applies a [`SignatureMode`] and a trust policy to wheels.
#[derive(Clone)]
pub struct SignatureVerifier {
    oracle: Arc<dyn TrustOracle>,
    identities: Vec<TrustedIdentity>,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("identities", &self.identities)
            .finish_non_exhaustive()
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new(Arc::new(SigstoreOracle::new()))
    }
}

impl SignatureVerifier {
    /// Verifier trusting the default identities.
    #[must_use]
    pub fn new(oracle: Arc<dyn TrustOracle>) -> Self {
        Self {
            oracle,
            identities: default_trusted_identities(),
        }
    }

    /// Replace the trusted identities. An empty list never passes a bundle.
    #[must_use]
    pub fn with_identities(mut self, identities: Vec<TrustedIdentity>) -> Self {
        self.identities = identities;
        self
    }

    /// Trusted identities, in match order.
    #[must_use]
    pub fn identities(&self) -> &[TrustedIdentity] {
        &self.identities
    }

    /// Verify a wheel using the bundle found next to it.
    ///
    /// # Errors
    ///
    /// See [`SignatureVerifier::verify`].
    pub fn verify_wheel(&self, wheel: &Path, mode: SignatureMode) -> PluginResult<SignatureInfo> {
        let name = wheel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if mode == SignatureMode::Disabled {
            return Ok(SignatureInfo::with_status(SignatureStatus::Skipped));
        }
        self.verify(wheel, find_bundle(wheel).as_deref(), &name, mode)
    }

    /// Verify `artifact` against `bundle`.
    ///
    /// `display_name` is the wheel file name used in messages (the artifact
    /// may be a staging file).
    ///
    /// # Errors
    ///
    /// In [`SignatureMode::Strict`], returns
    /// [`PluginError::SignatureVerification`] when the bundle is missing or no
    /// trusted identity matches. Other modes never fail.
    pub fn verify(
        &self,
        artifact: &Path,
        bundle: Option<&Path>,
        display_name: &str,
        mode: SignatureMode,
    ) -> PluginResult<SignatureInfo> {
        if mode == SignatureMode::Disabled {
            return Ok(SignatureInfo::with_status(SignatureStatus::Skipped));
        }

        let Some(bundle) = bundle else {
            let message = format!("No signature bundle found for {display_name}");
            return reject(SignatureStatus::Missing, message, mode);
        };

        if let Err(e) = check_bundle_shape(bundle) {
            let message =
                format!("Signature verification failed for {display_name}: malformed bundle ({e})");
            return reject(SignatureStatus::Invalid, message, mode);
        }

        for identity in &self.identities {
            match self.oracle.verify(artifact, bundle, identity) {
                Ok(()) => {
                    info!(
                        wheel = %display_name,
                        repository = %identity.repository,
                        "Signature valid"
                    );
                    return Ok(SignatureInfo {
                        status: SignatureStatus::Valid,
                        identity: Some(identity.repository.clone()),
                        message: None,
                    });
                },
                Err(reason) => {
                    debug!(
                        wheel = %display_name,
                        repository = %identity.repository,
                        reason = %reason,
                        "Identity did not match"
                    );
                },
            }
        }

        let message =
            format!("Signature verification failed for {display_name}: no trusted identity matched");
        reject(SignatureStatus::Invalid, message, mode)
    }

}

fn reject(
    status: SignatureStatus,
    message: String,
    mode: SignatureMode,
) -> PluginResult<SignatureInfo> {
    if mode == SignatureMode::Strict {
        return Err(PluginError::SignatureVerification { status, message });
    }
    warn!("{message}");
    Ok(SignatureInfo {
        status,
        identity: None,
        message: Some(message),
    })
}

fn check_bundle_shape(bundle: &Path) -> Result<(), String> {
    let raw = std::fs::read(bundle).map_err(|e| e.to_string())?;
    let value: serde_json::Value = serde_json::from_slice(&raw).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(())
    } else {
        Err("bundle is not a JSON object".to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Oracle accepting a fixed set of repositories and recording calls.
    struct RecordingOracle {
        accept: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingOracle {
        fn accepting(repos: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                accept: repos.iter().map(|r| (*r).to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl TrustOracle for RecordingOracle {
        fn verify(&self, _: &Path, _: &Path, identity: &TrustedIdentity) -> Result<(), String> {
            self.calls.lock().unwrap().push(identity.repository.clone());
            if self.accept.contains(&identity.repository) {
                Ok(())
            } else {
                Err("no match".into())
            }
        }
    }

    fn wheel_with_bundle(dir: &Path, suffix: Option<&str>) -> PathBuf {
        let wheel = dir.join("tokenscanner-1.0.0-py3-none-any.whl");
        std::fs::write(&wheel, b"wheel").unwrap();
        if let Some(suffix) = suffix {
            std::fs::write(
                dir.join(format!("tokenscanner-1.0.0-py3-none-any.whl{suffix}")),
                br#"{"mediaType":"application/vnd.dev.sigstore.bundle.v0.3+json"}"#,
            )
            .unwrap();
        }
        wheel
    }

    #[test]
    fn disabled_mode_skips_without_io() {
        let oracle = RecordingOracle::accepting(&[]);
        let verifier = SignatureVerifier::new(oracle.clone());
        let info = verifier
            .verify_wheel(Path::new("/nonexistent/x.whl"), SignatureMode::Disabled)
            .unwrap();
        assert_eq!(info.status, SignatureStatus::Skipped);
        assert!(oracle.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn strict_missing_bundle_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), None);
        let verifier = SignatureVerifier::new(RecordingOracle::accepting(&[]));
        let err = verifier
            .verify_wheel(&wheel, SignatureMode::Strict)
            .unwrap_err();
        match err {
            PluginError::SignatureVerification { status, message } => {
                assert_eq!(status, SignatureStatus::Missing);
                assert_eq!(
                    message,
                    "No signature bundle found for tokenscanner-1.0.0-py3-none-any.whl"
                );
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn warn_missing_bundle_returns_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), None);
        let verifier = SignatureVerifier::new(RecordingOracle::accepting(&[]));
        let info = verifier.verify_wheel(&wheel, SignatureMode::Warn).unwrap();
        assert_eq!(info.status, SignatureStatus::Missing);
        assert!(info.message.is_some());
    }

    #[test]
    fn valid_when_trusted_identity_matches() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), Some(".sigstore"));
        let verifier =
            SignatureVerifier::new(RecordingOracle::accepting(&["GitGuardian/satori"]));
        let info = verifier.verify_wheel(&wheel, SignatureMode::Strict).unwrap();
        assert_eq!(info.status, SignatureStatus::Valid);
        assert_eq!(info.identity.as_deref(), Some("GitGuardian/satori"));
        assert_eq!(info.label(), "valid (GitGuardian/satori)");
    }

    #[test]
    fn identities_tried_in_order_until_match() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), Some(".sigstore.json"));
        let oracle = RecordingOracle::accepting(&["acme/second"]);
        let verifier = SignatureVerifier::new(oracle.clone()).with_identities(vec![
            TrustedIdentity::github_actions("acme/first"),
            TrustedIdentity::github_actions("acme/second"),
            TrustedIdentity::github_actions("acme/third"),
        ]);
        let info = verifier.verify_wheel(&wheel, SignatureMode::Strict).unwrap();
        assert_eq!(info.identity.as_deref(), Some("acme/second"));
        assert_eq!(
            *oracle.calls.lock().unwrap(),
            vec!["acme/first".to_string(), "acme/second".to_string()]
        );
    }

    #[test]
    fn empty_identity_list_never_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), Some(".sigstore"));
        let verifier = SignatureVerifier::new(RecordingOracle::accepting(&["GitGuardian/satori"]))
            .with_identities(Vec::new());
        let info = verifier.verify_wheel(&wheel, SignatureMode::Warn).unwrap();
        assert_eq!(info.status, SignatureStatus::Invalid);
        assert!(verifier.verify_wheel(&wheel, SignatureMode::Strict).is_err());
    }

    #[test]
    fn malformed_bundle_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), None);
        std::fs::write(
            tmp.path().join("tokenscanner-1.0.0-py3-none-any.whl.sigstore"),
            b"not json",
        )
        .unwrap();
        let oracle = RecordingOracle::accepting(&["GitGuardian/satori"]);
        let verifier = SignatureVerifier::new(oracle.clone());
        let info = verifier.verify_wheel(&wheel, SignatureMode::Warn).unwrap();
        assert_eq!(info.status, SignatureStatus::Invalid);
        assert!(oracle.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn bundle_lookup_prefers_sigstore_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), Some(".sigstore.json"));
        std::fs::write(
            tmp.path().join("tokenscanner-1.0.0-py3-none-any.whl.sigstore"),
            b"{}",
        )
        .unwrap();
        let found = find_bundle(&wheel).unwrap();
        assert!(found.to_string_lossy().ends_with(".whl.sigstore"));
    }

    #[test]
    fn sigstore_oracle_rejects_unreadable_bundles() {
        let tmp = tempfile::tempdir().unwrap();
        let wheel = wheel_with_bundle(tmp.path(), Some(".sigstore"));
        let identity = TrustedIdentity::github_actions("GitGuardian/satori");
        let oracle = SigstoreOracle::new();

        std::fs::write(tmp.path().join("tokenscanner-1.0.0-py3-none-any.whl.sigstore"), b"not json")
            .unwrap();
        let bundle = find_bundle(&wheel).unwrap();
        assert!(oracle.verify(&wheel, &bundle, &identity).unwrap_err().contains("unreadable bundle"));

        let missing = tmp.path().join("absent.sigstore");
        assert!(oracle.verify(&wheel, &missing, &identity).unwrap_err().contains("failed to read bundle"));
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("WARN".parse::<SignatureMode>().unwrap(), SignatureMode::Warn);
        assert!("lenient".parse::<SignatureMode>().is_err());
        assert_eq!(SignatureMode::Strict.allow_unsigned(), SignatureMode::Warn);
        assert_eq!(
            SignatureMode::Disabled.allow_unsigned(),
            SignatureMode::Disabled
        );
    }

    #[test]
    fn signature_info_serializes_compactly() {
        let info = SignatureInfo {
            status: SignatureStatus::Missing,
            identity: None,
            message: None,
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"status":"missing"}"#
        );
    }
}
