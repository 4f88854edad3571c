//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use std::time::Duration;

use fieldsync_common::auth::CredentialError;
use fieldsync_core::map_credential_error;
use fieldsync_domain::SyncError;
use reqwest::StatusCode;
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401 or no usable credential - re-authorize, never back off
    Authentication,
    /// 429 - retry, honoring Retry-After
    RateLimit,
    /// 5xx - retryable
    Server,
    /// Other 4xx - non-retryable
    Client,
    /// Connection failures and timeouts - retryable
    Network,
    /// Unusable response body - non-retryable
    Protocol,
    /// Local misconfiguration - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String, retry_after: Option<Duration> },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String, retry_after: Option<Duration> },

    #[error("Client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Classifies a non-success status. `retry_after` is only kept where the
    /// server is allowed to ask for a delay (429 and 503).
    pub fn from_status(status: StatusCode, url: &str, body: &str, retry_after: Option<Duration>) -> Self {
        let message = if body.is_empty() {
            format!("{url} returned status {status}")
        } else {
            format!("{url} returned status {status}: {}", truncate(body, 512))
        };

        if status == StatusCode::UNAUTHORIZED {
            Self::Auth(message)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimit { message, retry_after }
        } else if status.is_server_error() {
            let retry_after = retry_after.filter(|_| status == StatusCode::SERVICE_UNAVAILABLE);
            Self::Server { status: status.as_u16(), message, retry_after }
        } else {
            Self::Client { status: status.as_u16(), message }
        }
    }

    pub fn invalid_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse { endpoint: endpoint.into(), message: message.into() }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) | Self::Credential(_) => ApiErrorCategory::Authentication,
            Self::RateLimit { .. } => ApiErrorCategory::RateLimit,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Client { .. } => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::InvalidResponse { .. } => ApiErrorCategory::Protocol,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Check if this error should be retried with backoff
    pub fn should_retry(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } | Self::Server { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status behind this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth(_) => Some(StatusCode::UNAUTHORIZED.as_u16()),
            Self::RateLimit { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            Self::Server { status, .. } | Self::Client { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        let status = err.status();
        match err {
            ApiError::Auth(message) => Self::Authorization(message),
            ApiError::Credential(inner) => map_credential_error(inner),
            ApiError::RateLimit { message, .. } | ApiError::Server { message, .. } => {
                Self::Transient { status, message }
            }
            ApiError::Network(message) => Self::Transient { status: None, message },
            ApiError::Timeout(after) => {
                Self::Transient { status: None, message: format!("request timed out after {after:?}") }
            }
            ApiError::Client { status, message } => Self::Client { status, message },
            ApiError::InvalidResponse { endpoint, message } => Self::Protocol { endpoint, message },
            ApiError::Config(message) => Self::Configuration(message),
        }
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
