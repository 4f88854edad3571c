//! Traits for OAuth, credential storage and authorization flows
//!
//! These traits enable dependency injection and testing by abstracting
//! external dependencies (authorization server, disk, the user's browser).

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::credential_manager::CredentialError;
use super::pkce::PkceChallenge;
use super::types::{Credential, CredentialKey, TokenResponse};

/// Trait for OAuth client operations
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Builds the URL the user opens to grant `scopes`.
    ///
    /// # Errors
    /// Returns `ConfigError` if no authorization endpoint is configured.
    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        challenge: &PkceChallenge,
    ) -> Result<String, OAuthClientError>;

    /// Exchanges an authorization code (plus PKCE verifier) for tokens.
    ///
    /// # Errors
    /// Returns error if the exchange fails or the response cannot be parsed.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError>;

    /// Obtains a new access token from a refresh token.
    ///
    /// # Errors
    /// Returns error if refresh fails or the grant was revoked.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthClientError>;
}

/// Durable credential storage keyed by API and application.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the stored credential, `None` if nothing is stored.
    async fn load(&self, key: &CredentialKey) -> Result<Option<Credential>, CredentialError>;

    /// Replaces whatever is stored under `key`.
    async fn save(&self, key: &CredentialKey, credential: &Credential)
        -> Result<(), CredentialError>;

    /// Removes the stored credential. Removing nothing is not an error.
    async fn invalidate(&self, key: &CredentialKey) -> Result<(), CredentialError>;
}

/// Interactive (or scripted) authorization-code grant.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Runs the flow end to end and returns the exchanged tokens.
    async fn authorize(
        &self,
        client: &dyn OAuthClientTrait,
        scopes: &[String],
    ) -> Result<TokenResponse, CredentialError>;
}

/// Hands out valid credentials to request-issuing components.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Returns a credential that is unexpired and covers `scopes`.
    async fn acquire(&self, scopes: &[String]) -> Result<Credential, CredentialError>;

    /// Drops the current credential so the next `acquire` obtains a new one.
    async fn invalidate(&self) -> Result<(), CredentialError>;
}
