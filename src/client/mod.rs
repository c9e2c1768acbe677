//! HTTP client for the Arcane REST API.
//!
//! [`Client`] holds the connection settings and the request plumbing; the
//! endpoint methods live next to their models in the submodules, each adding
//! an `impl Client` (or `impl EnvironmentClient`) block.

mod environments;
mod git;
#[allow(missing_docs)]
pub mod models;
mod projects;
mod registries;

use std::time::Duration;

use reqwest::{header, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiError, ClientError};

/// Request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const API_KEY_HEADER: &str = "X-API-Key";

/// Connection settings for [`Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://arcane.local:8000`.
    pub url: String,
    /// API key sent as `X-API-Key` when set.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Settings for `url` with no API key and the default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set (or clear) the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Envelope around single-item responses.
#[derive(Debug, Deserialize)]
struct SingleResponse<T> {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    data: T,
}

/// Envelope around list responses.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Whether the backend reported success.
    #[serde(default)]
    pub success: bool,
    /// Items on this page.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
    /// Paging metadata.
    #[serde(default)]
    pub pagination: Pagination,
}

/// Paging metadata attached to list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Number of pages.
    pub total_pages: u64,
    /// Number of items across all pages.
    pub total_items: u64,
    /// 1-based page number of this response.
    pub current_page: u64,
    /// Page size.
    pub items_per_page: u64,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Client for the Arcane API.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl Client {
    /// Build a client. Fails when the URL is empty or not an absolute http(s) URL.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let trimmed = config.url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ClientError::InvalidUrl("arcane URL is required".to_string()));
        }
        let base_url =
            Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{}: expected an http or https URL",
                trimmed
            )));
        }

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// A view of this client scoped to one environment.
    pub fn for_environment(&self, environment_id: impl Into<String>) -> EnvironmentClient {
        EnvironmentClient {
            client: self.clone(),
            environment_id: environment_id.into(),
        }
    }

    /// Resolve path segments against the base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the raw body of a successful response.
    async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<Vec<u8>, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        debug!(method = %method, url = %url, "arcane request");

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        request = match body {
            Some(body) => request.json(body),
            None => request.header(header::CONTENT_TYPE, "application/json"),
        };

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.is_client_error() || status.is_server_error() {
            let err = api_error(status, &bytes);
            if status != StatusCode::NOT_FOUND {
                warn!(method = %method, url = %url, status = status.as_u16(), "arcane request failed");
            }
            return Err(err.into());
        }

        Ok(bytes.to_vec())
    }

    async fn get_one<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let body = self.send::<()>(Method::GET, segments, None).await?;
        Ok(decode::<SingleResponse<T>>(&body)?.data)
    }

    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, ClientError> {
        let body = self.send::<()>(Method::GET, segments, None).await?;
        Ok(decode::<Page<T>>(&body)?.data)
    }

    async fn write_one<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(method, segments, Some(body)).await?;
        Ok(decode::<SingleResponse<T>>(&body)?.data)
    }

    /// Fire a request whose response body is ignored.
    async fn call<B>(&self, method: Method, segments: &[&str], body: Option<&B>) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.send(method, segments, body).await.map(|_| ())
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<ApiError>(body) {
        Ok(mut err) => {
            err.status = status.as_u16();
            err
        }
        Err(_) => ApiError::new(status.as_u16(), String::from_utf8_lossy(body).trim()),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    serde_json::from_slice(body).map_err(ClientError::Decode)
}

/// A [`Client`] scoped to one environment (`/api/environments/{id}/...`).
#[derive(Debug, Clone)]
pub struct EnvironmentClient {
    client: Client,
    environment_id: String,
}

impl EnvironmentClient {
    /// The environment this client talks to.
    pub fn environment_id(&self) -> &str {
        &self.environment_id
    }

    /// The unscoped client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
