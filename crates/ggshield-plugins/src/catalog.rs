//! GitGuardian plugin registry client.
//!
//! Two endpoints:
//! - `GET {api}/v1/plugins?platform=&arch=`: the account's plan, feature flags
//!   and the plugin catalog
//! - `GET {api}/v1/plugins/{name}/download?platform=&arch=&python_abi=&version=`:
//!   a short-lived download URL with the expected checksum

use std::collections::BTreeMap;

use ggshield_core::PlatformInfo;
use ggshield_core::platform::ANY_PLATFORM;
use serde::Deserialize;
use url::Url;

use crate::context::PluginContext;
use crate::error::{PluginError, PluginResult};

/// A catalog entry, with availability resolved for the current platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Registry name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Description.
    pub description: String,
    /// Whether this account can install it on this platform.
    pub available: bool,
    /// Latest published version.
    pub latest_version: Option<String>,
    /// `{os}-{arch}` tags (or `any-any`); empty means unrestricted.
    pub supported_platforms: Vec<String>,
    /// Why the plugin is unavailable, if it is.
    pub reason: Option<String>,
}

impl PluginInfo {
    /// Whether the entry's platform list admits `platform`.
    #[must_use]
    pub fn is_platform_supported(&self, platform: &PlatformInfo) -> bool {
        platform_supported(&self.supported_platforms, &platform.tag())
    }
}

/// The account's view of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCatalog {
    /// Plan name.
    pub plan: String,
    /// Feature flags.
    pub features: BTreeMap<String, bool>,
    /// Catalog entries.
    pub plugins: Vec<PluginInfo>,
}

impl PluginCatalog {
    /// Entry by registry name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Entry by name, only if it is available.
    #[must_use]
    pub fn find_available(&self, name: &str) -> Option<&PluginInfo> {
        self.find(name).filter(|p| p.available)
    }
}

/// Download instructions for one wheel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginDownloadInfo {
    /// Pre-signed download URL.
    pub download_url: String,
    /// Wheel file name.
    pub filename: String,
    /// Expected SHA-256 (hex).
    pub sha256: String,
    /// Version being served.
    pub version: String,
    /// Expiry of `download_url`.
    pub expires_at: String,
    /// Sigstore bundle URL, when the wheel is signed.
    #[serde(default)]
    pub signature_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAccount {
    plan: Option<String>,
    features: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    account: Option<RawAccount>,
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    features: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    plugins: Vec<RawPlugin>,
}

#[derive(Debug, Deserialize)]
struct RawPlugin {
    name: Option<String>,
    display_name: Option<String>,
    description: Option<String>,
    available: Option<bool>,
    latest_version: Option<String>,
    #[serde(default)]
    supported_platforms: Vec<String>,
    reason: Option<String>,
}

fn platform_supported(supported: &[String], current: &str) -> bool {
    supported.is_empty() || supported.iter().any(|p| p == current || p == ANY_PLATFORM)
}

impl RawPlugin {
    fn into_info(self, current: &str) -> PluginInfo {
        let platform_ok = platform_supported(&self.supported_platforms, current);
        let available = self.available.unwrap_or(true) && platform_ok;

        let reason = self.reason.filter(|r| !r.is_empty()).or_else(|| {
            (!platform_ok).then(|| {
                format!(
                    "Not available for {current}. Supported: {}",
                    self.supported_platforms.join(", ")
                )
            })
        });

        let name = self.name.unwrap_or_else(|| "unknown".to_string());
        PluginInfo {
            display_name: self.display_name.unwrap_or_else(|| name.clone()),
            name,
            description: self.description.unwrap_or_default(),
            available,
            latest_version: self.latest_version,
            supported_platforms: self.supported_platforms,
            reason,
        }
    }
}

/// Client for the registry endpoints.
#[derive(Debug)]
pub struct CatalogClient<'a> {
    ctx: &'a PluginContext,
}

impl<'a> CatalogClient<'a> {
    /// Client using `ctx`'s endpoint, key and transport.
    #[must_use]
    pub fn new(ctx: &'a PluginContext) -> Self {
        Self { ctx }
    }

    /// Fetch the catalog for the current account and platform.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Api`] on a missing key, an error status, or a
    /// malformed body, and [`PluginError::Network`] on transport failure.
    pub fn fetch_catalog(&self) -> PluginResult<PluginCatalog> {
        let platform = &self.ctx.platform;
        let url = self.endpoint(
            &["v1", "plugins"],
            &[("platform", &platform.os), ("arch", &platform.arch)],
        )?;

        let response = self.ctx.http.get(url.as_str(), &self.headers()?)?;
        if !response.is_success() {
            return Err(PluginError::Api(format!(
                "Failed to fetch plugins: HTTP {}",
                response.status
            )));
        }

        let raw: RawCatalog = response.json()?;
        let current = platform.tag();
        let account = raw.account.unwrap_or_default();

        Ok(PluginCatalog {
            plan: account
                .plan
                .or(raw.plan)
                .unwrap_or_else(|| "unknown".to_string()),
            features: account.features.or(raw.features).unwrap_or_default(),
            plugins: raw
                .plugins
                .into_iter()
                .map(|p| p.into_info(&current))
                .collect(),
        })
    }

    /// Request download instructions for `name` at `version` (latest if `None`).
    ///
    /// # Errors
    ///
    /// - [`PluginError::NotAvailable`] on 403, or on 404 with reason
    ///   "Plugin or version not found"
    /// - [`PluginError::Api`] on other error statuses or a malformed body
    pub fn download_info(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> PluginResult<PluginDownloadInfo> {
        let platform = &self.ctx.platform;
        let mut params = vec![
            ("platform", platform.os.as_str()),
            ("arch", platform.arch.as_str()),
            ("python_abi", platform.abi.as_str()),
        ];
        if let Some(version) = version {
            params.push(("version", version));
        }
        let url = self.endpoint(&["v1", "plugins", name, "download"], &params)?;

        let response = self.ctx.http.get(url.as_str(), &self.headers()?)?;
        match response.status {
            403 => {
                return Err(PluginError::NotAvailable {
                    name: name.to_string(),
                    reason: None,
                });
            },
            404 => {
                return Err(PluginError::NotAvailable {
                    name: name.to_string(),
                    reason: Some("Plugin or version not found".to_string()),
                });
            },
            _ if !response.is_success() => {
                return Err(PluginError::Api(format!(
                    "Failed to get download info: HTTP {}",
                    response.status
                )));
            },
            _ => {},
        }

        response.json()
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, &str)]) -> PluginResult<Url> {
        let mut url = Url::parse(&self.ctx.api_url)
            .map_err(|e| PluginError::Api(format!("invalid API URL {}: {e}", self.ctx.api_url)))?;
        url.path_segments_mut()
            .map_err(|()| PluginError::Api(format!("invalid API URL {}", self.ctx.api_url)))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    fn headers(&self) -> PluginResult<Vec<(&'static str, String)>> {
        let key = self.ctx.api_key.as_deref().ok_or_else(|| {
            PluginError::Api(
                "No GitGuardian API key configured. Set GITGUARDIAN_API_KEY or pass --api-key."
                    .to_string(),
            )
        })?;
        Ok(vec![
            ("Authorization", format!("Token {key}")),
            ("Content-Type", "application/json".to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use ggshield_core::GgshieldDirs;

    use super::*;
    use crate::http::{Headers, HttpClient, HttpResponse};

    /// Canned responses keyed by URL path, recording full request URLs.
    #[derive(Default)]
    struct Canned {
        routes: HashMap<String, (u16, String)>,
        seen: Mutex<Vec<(String, Vec<(&'static str, String)>)>>,
    }

    impl HttpClient for Canned {
        fn get(&self, url: &str, headers: Headers<'_>) -> PluginResult<HttpResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((url.to_string(), headers.to_vec()));
            let path = Url::parse(url).unwrap().path().to_string();
            let (status, body) = self
                .routes
                .get(&path)
                .cloned()
                .unwrap_or((404, String::new()));
            Ok(HttpResponse::from_bytes(status, body))
        }
    }

    fn ctx(http: Arc<Canned>) -> PluginContext {
        PluginContext::new(GgshieldDirs::from_path("/tmp/unused"), http)
            .with_api("https://api.example.test/", Some("secret".into()))
            .with_platform(PlatformInfo::new("linux", "x86_64", "cp312"))
    }

    fn canned(routes: &[(&str, u16, &str)]) -> Arc<Canned> {
        Arc::new(Canned {
            routes: routes
                .iter()
                .map(|(p, s, b)| ((*p).to_string(), (*s, (*b).to_string())))
                .collect(),
            seen: Mutex::default(),
        })
    }

    #[test]
    fn catalog_with_account_nesting_and_availability() {
        let http = canned(&[(
            "/v1/plugins",
            200,
            r#"{
                "account": {"plan": "Business", "features": {"tokenscanner": true, "beta": false}},
                "plugins": [
                    {"name": "tokenscanner", "display_name": "Token Scanner", "description": "d",
                     "available": true, "latest_version": "1.0.0", "supported_platforms": []},
                    {"name": "mac-only", "available": true, "supported_platforms": ["macos-arm64"]},
                    {"name": "anywhere", "supported_platforms": ["any-any"]},
                    {"name": "locked", "available": false, "supported_platforms": ["linux-x86_64"],
                     "reason": "Requires Enterprise plan"}
                ]
            }"#,
        )]);
        let ctx = ctx(http.clone());
        let catalog = CatalogClient::new(&ctx).fetch_catalog().unwrap();

        assert_eq!(catalog.plan, "Business");
        assert_eq!(catalog.features.get("tokenscanner"), Some(&true));

        let ts = catalog.find("tokenscanner").unwrap();
        assert!(ts.available);
        assert_eq!(ts.reason, None);

        let mac = catalog.find("mac-only").unwrap();
        assert!(!mac.available);
        assert_eq!(
            mac.reason.as_deref(),
            Some("Not available for linux-x86_64. Supported: macos-arm64")
        );
        assert_eq!(mac.display_name, "mac-only");

        assert!(catalog.find("anywhere").unwrap().available);

        let locked = catalog.find("locked").unwrap();
        assert!(!locked.available);
        assert_eq!(locked.reason.as_deref(), Some("Requires Enterprise plan"));
        assert!(catalog.find_available("locked").is_none());

        let seen = http.seen.lock().unwrap();
        let (url, headers) = &seen[0];
        assert_eq!(
            url,
            "https://api.example.test/v1/plugins?platform=linux&arch=x86_64"
        );
        assert!(headers.contains(&("Authorization", "Token secret".to_string())));
    }

    #[test]
    fn catalog_top_level_plan() {
        let http = canned(&[("/v1/plugins", 200, r#"{"plan": "Free", "plugins": []}"#)]);
        let ctx = ctx(http);
        let catalog = CatalogClient::new(&ctx).fetch_catalog().unwrap();
        assert_eq!(catalog.plan, "Free");
        assert!(catalog.features.is_empty());
    }

    #[test]
    fn catalog_error_status() {
        let http = canned(&[("/v1/plugins", 401, "")]);
        let ctx = ctx(http);
        let err = CatalogClient::new(&ctx).fetch_catalog().unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch plugins: HTTP 401");
    }

    #[test]
    fn missing_api_key() {
        let http = canned(&[]);
        let ctx = PluginContext::new(GgshieldDirs::from_path("/tmp/unused"), http);
        assert!(matches!(
            CatalogClient::new(&ctx).fetch_catalog(),
            Err(PluginError::Api(_))
        ));
    }

    #[test]
    fn download_info_params_and_statuses() {
        let http = canned(&[
            (
                "/v1/plugins/tokenscanner/download",
                200,
                r#"{"download_url": "https://cdn.example.test/t.whl?sig=1",
                    "filename": "tokenscanner-1.0.0-py3-none-any.whl",
                    "sha256": "abc", "version": "1.0.0",
                    "expires_at": "2030-01-01T00:00:00Z",
                    "signature_url": "https://cdn.example.test/t.whl.sigstore"}"#,
            ),
            ("/v1/plugins/forbidden/download", 403, ""),
        ]);
        let ctx = ctx(http.clone());
        let client = CatalogClient::new(&ctx);

        let info = client.download_info("tokenscanner", Some("1.0.0")).unwrap();
        assert_eq!(info.version, "1.0.0");
        assert!(info.signature_url.is_some());
        assert_eq!(
            http.seen.lock().unwrap()[0].0,
            "https://api.example.test/v1/plugins/tokenscanner/download?platform=linux&arch=x86_64&python_abi=cp312&version=1.0.0"
        );

        let forbidden = client.download_info("forbidden", None).unwrap_err();
        assert_eq!(forbidden.to_string(), "Plugin 'forbidden' is not available");

        let missing = client.download_info("ghost", None).unwrap_err();
        assert_eq!(
            missing.to_string(),
            "Plugin 'ghost' is not available: Plugin or version not found"
        );
    }
}
