//! Blocking HTTP seam.
//!
//! Every network call made by the plugin subsystem goes through
//! [`HttpClient`] so acquirers, the catalog client and the update checker can
//! be exercised without a network.

use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{PluginError, PluginResult};

/// Maximum size of any single download (100 MB).
pub const MAX_DOWNLOAD_SIZE: u64 = 104_857_600;

/// Maximum size of a JSON API response (10 MB).
const MAX_JSON_SIZE: u64 = 10_485_760;

const USER_AGENT: &str = concat!("ggshield/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_REDIRECTS: usize = 10;

/// Request headers as `(name, value)` pairs.
pub type Headers<'a> = &'a [(&'static str, String)];

/// A response with a streaming body.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    body: Box<dyn Read + Send>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Wrap a status and a body reader.
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// Build a response from an in-memory body.
    #[must_use]
    pub fn from_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, std::io::Cursor::new(body.into()))
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Stream the body into `writer`, failing once more than `limit` bytes arrive.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::PackageTooLarge`] past the limit, or
    /// [`PluginError::Download`] if reading or writing fails.
    pub fn copy_to(self, writer: &mut impl Write, limit: u64) -> PluginResult<u64> {
        let mut limited = self.body.take(limit.saturating_add(1));
        let copied = std::io::copy(&mut limited, writer)
            .map_err(|e| PluginError::Download(format!("failed to read response body: {e}")))?;
        if copied > limit {
            return Err(PluginError::PackageTooLarge {
                size: copied,
                limit,
            });
        }
        Ok(copied)
    }

    /// Read the whole body (bounded) into memory.
    ///
    /// # Errors
    ///
    /// Same as [`HttpResponse::copy_to`].
    pub fn bytes(self, limit: u64) -> PluginResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.copy_to(&mut buf, limit)?;
        Ok(buf)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Api`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(self) -> PluginResult<T> {
        let body = self.bytes(MAX_JSON_SIZE)?;
        serde_json::from_slice(&body)
            .map_err(|e| PluginError::Api(format!("invalid JSON response: {e}")))
    }
}

/// A minimal blocking GET client.
pub trait HttpClient: Send + Sync {
    /// Issue a GET request. Non-2xx statuses are returned, not raised.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Network`] on transport failure.
    fn get(&self, url: &str, headers: Headers<'_>) -> PluginResult<HttpResponse>;
}

/// [`HttpClient`] backed by `reqwest`'s blocking client.
#[derive(Debug, Clone)]
pub struct BlockingHttp {
    client: reqwest::blocking::Client,
}

impl BlockingHttp {
    /// Build a client with ggshield's user agent, timeout and redirect policy.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Network`] if the TLS backend cannot be initialised.
    pub fn new() -> PluginResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PluginError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for BlockingHttp {
    fn get(&self, url: &str, headers: Headers<'_>) -> PluginResult<HttpResponse> {
        tracing::debug!(url = %redact_query(url), "GET");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request
            .send()
            .map_err(|e| PluginError::Network(e.without_url().to_string()))?;

        if let Some(len) = response.content_length()
            && len > MAX_DOWNLOAD_SIZE
        {
            return Err(PluginError::PackageTooLarge {
                size: len,
                limit: MAX_DOWNLOAD_SIZE,
            });
        }

        Ok(HttpResponse::new(response.status().as_u16(), response))
    }
}

/// Drop the query string (signed download URLs carry credentials there).
pub(crate) fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
