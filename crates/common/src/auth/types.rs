//! OAuth 2.0 types and structures
//!
//! Defines the persisted [`Credential`], the token endpoint wire formats, and
//! client configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity a credential is stored under: the API it grants access to and
/// the application that obtained it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub api: String,
    pub application: String,
}

impl CredentialKey {
    pub fn new(api: impl Into<String>, application: impl Into<String>) -> Self {
        Self { api: api.into(), application: application.into() }
    }

    /// File-system safe name, e.g. `analytics.reporting-app`.
    pub fn storage_name(&self) -> String {
        let sanitize = |value: &str| -> String {
            value
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect()
        };
        format!("{}.{}", sanitize(&self.api), sanitize(&self.application))
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api, self.application)
    }
}

/// Access token plus everything needed to renew it.
///
/// The access token is usable while `expires_at` lies in the future (minus
/// the caller's leeway) and the granted scopes cover what is requested.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub key: CredentialKey,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// `None` when the provider did not report a lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// Builds a credential from a fresh token response.
    ///
    /// Providers may omit `scope` when the grant equals the request, in
    /// which case the requested scopes are recorded as granted.
    pub fn from_token_response(
        key: CredentialKey,
        response: TokenResponse,
        requested_scopes: &[String],
    ) -> Self {
        let scopes = response
            .granted_scopes()
            .unwrap_or_else(|| requested_scopes.iter().cloned().collect());
        Self {
            key,
            expires_at: response.expires_at(),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type,
            scopes,
        }
    }

    /// Applies a refresh response on top of `self`.
    ///
    /// A refresh response without a refresh token keeps the previous one.
    #[must_use]
    pub fn refreshed(&self, response: TokenResponse) -> Self {
        Self {
            key: self.key.clone(),
            expires_at: response.expires_at(),
            scopes: response.granted_scopes().unwrap_or_else(|| self.scopes.clone()),
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            token_type: response.token_type,
        }
    }

    /// True when the token is expired or expires within `leeway_seconds`.
    #[must_use]
    pub fn is_expired(&self, leeway_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(leeway_seconds) >= expires_at,
            None => false,
        }
    }

    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }

    /// Whether every requested scope was granted.
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|scope| self.scopes.contains(scope))
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn bearer(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// OAuth token response from the authorization server (RFC 6749 section 5.1).
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .filter(|seconds| *seconds > 0)
            .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds))
    }

    /// Space-separated `scope` split into a set, if the server sent one.
    pub fn granted_scopes(&self) -> Option<BTreeSet<String>> {
        self.scope
            .as_deref()
            .filter(|scope| !scope.trim().is_empty())
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// OAuth client registration and endpoints.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    /// Appended to the authorization URL (e.g. `access_type=offline`).
    pub extra_authorize_params: Vec<(String, String)>,
    pub timeout: Duration,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            extra_authorize_params: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_client_secret(mut self, secret: Option<String>) -> Self {
        self.client_secret = secret.filter(|secret| !secret.is_empty());
        self
    }

    #[must_use]
    pub fn with_authorize_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_authorize_params.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("extra_authorize_params", &self.extra_authorize_params)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// OAuth error response from the authorization server (RFC 6749 section 5.2).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
