//! OAuth 2.0 client implementation with PKCE support
//!
//! Talks to the authorization server on behalf of the credential manager:
//! - Authorization URL building (PKCE S256 + state)
//! - Authorization code exchange
//! - Token refresh
//!
//! Failures are classified so callers can tell a flaky token endpoint
//! (retry) from a rejected grant (re-authorize).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::pkce::PkceChallenge;
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthError, TokenResponse};

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed before a response arrived
    RequestFailed(reqwest::Error),

    /// OAuth server rejected the request
    OAuthError { status: u16, error: OAuthError },

    /// Token endpoint is unavailable (5xx or 429)
    ServerUnavailable { status: u16, body: String },

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration
    ConfigError(String),
}

impl OAuthClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::ServerUnavailable { .. } => true,
            Self::OAuthError { .. }
            | Self::ParseError(_)
            | Self::NoRefreshToken
            | Self::ConfigError(_) => false,
        }
    }
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::OAuthError { status, error } => write!(f, "OAuth error (HTTP {status}): {error}"),
            Self::ServerUnavailable { status, body } => {
                write!(f, "token endpoint unavailable (HTTP {status}): {body}")
            }
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OAuth 2.0 client with PKCE support
///
/// Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE). Holds no token
/// state; the credential manager owns that.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// # Errors
    /// Returns `ConfigError` if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig) -> Result<Self, OAuthClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OAuthClientError::ConfigError(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn with_client_credentials(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("client_id", self.config.client_id.clone()));
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }
        params
    }

    async fn post_token_request(
        &self,
        params: &[(&'static str, String)],
    ) -> Result<TokenResponse, OAuthClientError> {
        let response = self.client.post(&self.config.token_endpoint).form(params).send().await?;
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| OAuthClientError::ParseError(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "token endpoint returned an error");

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OAuthClientError::ServerUnavailable { status: status.as_u16(), body });
        }

        let error = serde_json::from_str::<OAuthError>(&body).unwrap_or(OAuthError {
            error: status.canonical_reason().unwrap_or("unknown_error").to_string(),
            error_description: Some(body).filter(|body| !body.is_empty()),
        });
        Err(OAuthClientError::OAuthError { status: status.as_u16(), error })
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        challenge: &PkceChallenge,
    ) -> Result<String, OAuthClientError> {
        if self.config.authorization_endpoint.is_empty() {
            return Err(OAuthClientError::ConfigError(
                "authorization endpoint is not configured".to_string(),
            ));
        }

        let mut params = vec![
            ("response_type".to_string(), "code".to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("scope".to_string(), scopes.join(" ")),
            ("state".to_string(), challenge.state.clone()),
            ("code_challenge".to_string(), challenge.code_challenge.clone()),
            ("code_challenge_method".to_string(), challenge.challenge_method().to_string()),
        ];
        params.extend(self.config.extra_authorize_params.iter().cloned());

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.config.authorization_endpoint.contains('?') { '&' } else { '?' };
        Ok(format!("{}{separator}{query_string}", self.config.authorization_endpoint))
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        let params = self.with_client_credentials(vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code_verifier", code_verifier.to_string()),
        ]);
        self.post_token_request(&params).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }
        let params = self.with_client_credentials(vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ]);
        self.post_token_request(&params).await
    }
}
