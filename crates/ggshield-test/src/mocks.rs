//! Mock implementations for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ggshield_plugins::http::{Headers, HttpClient, HttpResponse};
use ggshield_plugins::plugin::{GgshieldPlugin, PluginMetadata};
use ggshield_plugins::registry::{PluginCommand, PluginRegistry};
use ggshield_plugins::signature::{TrustOracle, TrustedIdentity};
use ggshield_plugins::{PluginError, PluginResult};

/// A request seen by [`FakeHttp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Full request URL.
    pub url: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    /// Value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// In-memory [`HttpClient`] with canned responses.
///
/// A route matches the full URL first, then the URL without its query
/// string. Unrouted requests fail with [`PluginError::Network`].
#[derive(Debug, Clone, Default)]
pub struct FakeHttp {
    routes: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeHttp {
    /// No routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with `status` at `url`.
    #[must_use]
    pub fn with_response(self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.respond(url, status, body);
        self
    }

    /// Serve a JSON body with `status` at `url`.
    #[must_use]
    pub fn with_json(self, url: impl Into<String>, status: u16, body: &serde_json::Value) -> Self {
        self.respond(url, status, body.to_string());
        self
    }

    /// Add or replace a route.
    pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.into(), (status, body.into()));
        }
    }

    /// Every request made so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of requests whose URL starts with `prefix`.
    #[must_use]
    pub fn request_count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .map(|g| g.iter().filter(|r| r.url.starts_with(prefix)).count())
            .unwrap_or_default()
    }

    /// Wrap in an `Arc` for a plugin context.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn HttpClient> {
        Arc::new(self.clone())
    }
}

impl HttpClient for FakeHttp {
    fn get(&self, url: &str, headers: Headers<'_>) -> PluginResult<HttpResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
            });
        }

        let without_query = url.split('?').next().unwrap_or(url);
        let routed = self.routes.lock().ok().and_then(|routes| {
            routes
                .get(url)
                .or_else(|| routes.get(without_query))
                .cloned()
        });
        match routed {
            Some((status, body)) => Ok(HttpResponse::from_bytes(status, body)),
            None => Err(PluginError::Network(format!("no route for {url}"))),
        }
    }
}

/// [`TrustOracle`] returning a fixed verdict for every identity.
#[derive(Debug, Clone)]
pub struct StaticOracle {
    verdict: Result<(), String>,
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
}

impl StaticOracle {
    /// Accepts every bundle.
    #[must_use]
    pub fn accept() -> Self {
        Self {
            verdict: Ok(()),
            calls: Arc::default(),
        }
    }

    /// Rejects every bundle with `reason`.
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            verdict: Err(reason.into()),
            calls: Arc::default(),
        }
    }

    /// `(artifact, bundle)` pairs checked so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl TrustOracle for StaticOracle {
    fn verify(
        &self,
        artifact: &Path,
        bundle: &Path,
        _identity: &TrustedIdentity,
    ) -> Result<(), String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((artifact.to_path_buf(), bundle.to_path_buf()));
        }
        self.verdict.clone()
    }
}

/// A plugin registering one command, `{name}-scan`, that returns the
/// number of arguments it received.
#[derive(Debug, Clone)]
pub struct DemoPlugin {
    metadata: PluginMetadata,
}

impl DemoPlugin {
    /// Plugin `name` requiring host `min_version`.
    #[must_use]
    pub fn new(name: &str, min_version: &str) -> Self {
        Self {
            metadata: PluginMetadata {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                display_name: name.to_string(),
                description: format!("{name} test plugin"),
                min_ggshield_version: min_version.to_string(),
            },
        }
    }

    /// Boxed, for use in plugin constructors.
    #[must_use]
    pub fn boxed(name: &str, min_version: &str) -> Box<dyn GgshieldPlugin> {
        Box::new(Self::new(name, min_version))
    }
}

impl GgshieldPlugin for DemoPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn register(&self, registry: &mut PluginRegistry) -> PluginResult<()> {
        registry.register_command(PluginCommand::new(
            format!("{}-scan", self.metadata.name),
            format!("Run the {} scanner", self.metadata.display_name),
            |args| Ok(i32::try_from(args.len()).unwrap_or(i32::MAX)),
        ))
    }
}
