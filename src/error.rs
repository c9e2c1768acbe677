//! Error types for the Arcane provider.
//!
//! Two layers: [`ClientError`] describes what went wrong talking to the
//! Arcane backend, [`ProviderError`] is what provider operations return and
//! what ends up in front of the user as a [`Diagnostic`].

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::schema::Diagnostic;

/// An error response returned by the Arcane API.
///
/// The backend answers failures with `{"message": "...", "detail": "..."}`
/// and an HTTP status code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    /// HTTP status code of the response.
    #[serde(skip)]
    pub status: u16,
    /// Short error message.
    #[serde(default)]
    pub message: String,
    /// Optional longer explanation.
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiError {
    /// Create an API error with a status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    /// A synthesised 404, used by lookups that filter a list client-side.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// Whether this is the canonical not-found signal.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.message.is_empty(), self.detail.as_deref()) {
            (false, Some(detail)) if !detail.is_empty() => write!(
                f,
                "API error (status {}): {} - {}",
                self.status, self.message, detail
            ),
            (false, _) => write!(f, "API error (status {}): {}", self.status, self.message),
            (true, _) => write!(f, "API error (status {})", self.status),
        }
    }
}

impl std::error::Error for ApiError {}

/// Errors raised by the backend HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection refused, timeout, TLS...).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The configured base URL is unusable.
    #[error("invalid Arcane URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the backend reported 404 for this request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_not_found())
    }

    /// The HTTP status carried by the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => Some(err.status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors returned by provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object does not exist (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A state or config value did not match the expected shape.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Waited for the backend to become reachable and it never did.
    #[error("{operation}: timed out after {waited:?}: {source}")]
    Timeout {
        /// What was being waited for.
        operation: String,
        /// How long the wait lasted.
        waited: Duration,
        /// The last probe failure.
        #[source]
        source: ClientError,
    },

    /// The backend rejected or failed a call.
    #[error("{operation}: {source}")]
    Remote {
        /// The operation and identifiers involved.
        operation: String,
        /// The underlying client error.
        #[source]
        source: ClientError,
    },

    /// The operation was cancelled while waiting.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Invalid request from the caller (bad import id, missing lookup key...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Wrap a client error for `operation`.
    ///
    /// A 404 becomes [`ProviderError::NotFound`] so callers can treat it as
    /// "gone" on read and as success on delete; anything else is `Remote`.
    pub fn remote(operation: impl Into<String>, source: ClientError) -> Self {
        let operation = operation.into();
        if source.is_not_found() {
            Self::NotFound(format!("{}: {}", operation, source))
        } else {
            Self::Remote { operation, source }
        }
    }

    /// Whether this error means the remote object is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Remote { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Short summary used as the diagnostic headline.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource not found",
            Self::Validation(_) => "Invalid configuration",
            Self::Configuration(_) => "Provider not configured",
            Self::UnknownResource(_) => "Unknown resource type",
            Self::Serialization(_) => "Malformed value",
            Self::Timeout { .. } => "Agent not reachable",
            Self::Remote { .. } => "Arcane API request failed",
            Self::Cancelled(_) => "Operation cancelled",
            Self::InvalidRequest(_) => "Invalid request",
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::error(err.summary()).with_detail(err.to_string())
    }
}
