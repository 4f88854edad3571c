//! Credential manager
//!
//! Owns the credential lifecycle for one API/application pair:
//! - Lazy load from the credential store on first use
//! - Refresh ahead of expiry (configurable leeway)
//! - Authorization flow when nothing usable exists or scopes are missing
//! - Persistence after every change and invalidation on request
//!
//! All state sits behind a single async mutex, so concurrent callers never
//! trigger more than one refresh or authorization at a time.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::OAuthClientError;
use super::traits::{AuthorizationFlow, CredentialSource, CredentialStore, OAuthClientTrait};
use super::types::{Credential, CredentialKey};
use crate::resilience::{RetryConfig, RetryDecision, RetryError, RetryExecutor};

/// Error type for credential operations
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Caller asked for something that can never succeed
    #[error("Invalid credential request: {0}")]
    Configuration(String),

    /// No usable credential and no way to obtain one
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Authorization server refused the refresh grant
    #[error("Refresh rejected: {0}")]
    RefreshRejected(OAuthClientError),

    /// Token endpoint stayed unreachable through every retry
    #[error("Token endpoint unavailable after {attempts} attempt(s): {source}")]
    RefreshUnavailable { attempts: u32, source: OAuthClientError },

    /// Interactive authorization did not complete
    #[error("Authorization flow failed: {0}")]
    Flow(String),

    /// Credential store failed to read or write
    #[error("Credential store error: {0}")]
    Store(String),
}

struct Slot {
    loaded: bool,
    credential: Option<Credential>,
}

/// Default [`CredentialSource`]: store-backed, refreshing, re-authorizing.
pub struct CredentialManager {
    key: CredentialKey,
    client: Arc<dyn OAuthClientTrait>,
    store: Arc<dyn CredentialStore>,
    flow: Option<Arc<dyn AuthorizationFlow>>,
    refresh_retry: RetryConfig,
    refresh_leeway_seconds: i64,
    slot: Mutex<Slot>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(
        key: CredentialKey,
        client: Arc<dyn OAuthClientTrait>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            key,
            client,
            store,
            flow: None,
            refresh_retry: RetryConfig::default(),
            refresh_leeway_seconds: 60,
            slot: Mutex::new(Slot { loaded: false, credential: None }),
        }
    }

    /// Enables interactive authorization when no usable credential exists.
    #[must_use]
    pub fn with_flow(mut self, flow: Arc<dyn AuthorizationFlow>) -> Self {
        self.flow = Some(flow);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.refresh_retry = retry;
        self
    }

    #[must_use]
    pub fn with_refresh_leeway(mut self, seconds: i64) -> Self {
        self.refresh_leeway_seconds = seconds.max(0);
        self
    }

    pub fn key(&self) -> &CredentialKey {
        &self.key
    }

    /// Returns the cached credential without refreshing or loading it.
    pub async fn current(&self) -> Option<Credential> {
        self.slot.lock().await.credential.clone()
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, CredentialError> {
        let refresh_token = credential.refresh_token.clone().unwrap_or_default();
        let policy = |err: &OAuthClientError, _attempt: u32| {
            if err.is_transient() {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        };
        let executor = RetryExecutor::new(self.refresh_retry.clone(), policy);

        match executor.execute(|| self.client.refresh(&refresh_token)).await {
            Ok(response) => Ok(credential.refreshed(response)),
            Err(RetryError::AttemptsExhausted { attempts, last }) => {
                Err(CredentialError::RefreshUnavailable { attempts, source: last })
            }
            Err(RetryError::NonRetryable { error, .. }) => Err(CredentialError::RefreshRejected(error)),
            Err(RetryError::InvalidConfiguration { message }) => {
                Err(CredentialError::Configuration(message))
            }
        }
    }

    async fn authorize(&self, scopes: &[String]) -> Result<Credential, CredentialError> {
        let Some(flow) = &self.flow else {
            return Err(CredentialError::NotAuthorized(format!(
                "no usable credential for {} and no authorization flow configured",
                self.key
            )));
        };

        info!(credential = %self.key, scopes = ?scopes, "credential.authorization_started");
        let response = flow.authorize(self.client.as_ref(), scopes).await?;
        let credential = Credential::from_token_response(self.key.clone(), response, scopes);
        info!(credential = %self.key, "credential.authorized");
        Ok(credential)
    }
}

#[async_trait]
impl CredentialSource for CredentialManager {
    async fn acquire(&self, scopes: &[String]) -> Result<Credential, CredentialError> {
        if scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(CredentialError::Configuration("at least one scope is required".into()));
        }

        let mut slot = self.slot.lock().await;
        if !slot.loaded {
            slot.credential = self.store.load(&self.key).await?;
            slot.loaded = true;
            debug!(credential = %self.key, found = slot.credential.is_some(), "credential.loaded");
        }

        if let Some(current) = slot.credential.clone() {
            if !current.covers(scopes) {
                info!(credential = %self.key, "credential.scope_missing");
            } else if !current.is_expired(self.refresh_leeway_seconds) {
                return Ok(current);
            } else if current.can_refresh() {
                match self.refresh(&current).await {
                    Ok(renewed) => {
                        self.store.save(&self.key, &renewed).await?;
                        info!(
                            credential = %self.key,
                            expires_in = renewed.seconds_until_expiry(),
                            "credential.refreshed"
                        );
                        slot.credential = Some(renewed.clone());
                        return Ok(renewed);
                    }
                    Err(err @ CredentialError::RefreshRejected(_)) => {
                        warn!(credential = %self.key, error = %err, "credential.refresh_rejected");
                        self.store.invalidate(&self.key).await?;
                        slot.credential = None;
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                }
            } else {
                debug!(credential = %self.key, "credential.expired_without_refresh_token");
            }
        }

        let fresh = self.authorize(scopes).await?;
        self.store.save(&self.key, &fresh).await?;
        slot.credential = Some(fresh.clone());
        Ok(fresh)
    }

    async fn invalidate(&self) -> Result<(), CredentialError> {
        let mut slot = self.slot.lock().await;
        self.store.invalidate(&self.key).await?;
        slot.credential = None;
        slot.loaded = true;
        info!(credential = %self.key, "credential.invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::credential_manager.
    use std::time::Duration;

    use super::*;
    use crate::auth::types::TokenResponse;
    use crate::testing::mocks::{MemoryCredentialStore, MockAuthorizationFlow, MockOAuthClient};

    fn scopes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn key() -> CredentialKey {
        CredentialKey::new("analytics", "reports")
    }

    fn stored(access: &str, expires_in: i64, refresh: Option<&str>, scope: &str) -> Credential {
        Credential::from_token_response(
            key(),
            TokenResponse {
                access_token: access.to_string(),
                refresh_token: refresh.map(str::to_string),
                token_type: "Bearer".to_string(),
                expires_in: Some(expires_in),
                scope: Some(scope.to_string()),
            },
            &[],
        )
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(3)
            .fixed_backoff(Duration::from_millis(1))
            .no_jitter()
            .build()
            .unwrap()
    }

    fn manager(
        store: &Arc<MemoryCredentialStore>,
        client: &Arc<MockOAuthClient>,
        flow: Option<&Arc<MockAuthorizationFlow>>,
    ) -> CredentialManager {
        let manager = CredentialManager::new(key(), client.clone(), store.clone())
            .with_retry(fast_retry())
            .with_refresh_leeway(60);
        match flow {
            Some(flow) => manager.with_flow(flow.clone()),
            None => manager,
        }
    }

    /// Validates that a valid stored credential is reused as is.
    ///
    /// Assertions:
    /// - No refresh or authorization happens.
    /// - The stored access token is returned.
    #[tokio::test]
    async fn test_valid_credential_is_returned_without_network() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(stored("a-1", 3600, Some("r-1"), "read"));
        let client = Arc::new(MockOAuthClient::new());
        let flow = Arc::new(MockAuthorizationFlow::new("flow-token"));

        let credential =
            manager(&store, &client, Some(&flow)).acquire(&scopes(&["read"])).await.unwrap();

        assert_eq!(credential.access_token, "a-1");
        assert_eq!(client.refresh_calls(), 0);
        assert_eq!(flow.calls(), 0);
    }

    /// Validates refresh of an expired credential and its persistence.
    ///
    /// Assertions:
    /// - Exactly one refresh call is made.
    /// - The renewed credential is saved and keeps its refresh token.
    #[tokio::test]
    async fn test_expired_credential_is_refreshed_and_persisted() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(stored("a-1", 10, Some("r-1"), "read"));
        let client = Arc::new(MockOAuthClient::new());
        client.push_refresh(Ok(TokenResponse {
            access_token: "a-2".to_string(),
            refresh_token: None,
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            scope: None,
        }));

        let credential = manager(&store, &client, None).acquire(&scopes(&["read"])).await.unwrap();

        assert_eq!(credential.access_token, "a-2");
        assert_eq!(client.refresh_calls(), 1);
        let persisted = store.get(&key()).unwrap();
        assert_eq!(persisted.access_token, "a-2");
        assert_eq!(persisted.refresh_token.as_deref(), Some("r-1"));
    }

    /// Validates transient refresh failures are retried.
    #[tokio::test]
    async fn test_transient_refresh_failure_is_retried() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(stored("a-1", 1, Some("r-1"), "read"));
        let client = Arc::new(MockOAuthClient::new());
        client.push_refresh(Err(OAuthClientError::ServerUnavailable {
            status: 503,
            body: String::new(),
        }));

        let credential = manager(&store, &client, None).acquire(&scopes(&["read"])).await.unwrap();

        assert_eq!(client.refresh_calls(), 2);
        assert_ne!(credential.access_token, "a-1");
    }

    /// Validates a rejected refresh invalidates storage and fails the call.
    ///
    /// Assertions:
    /// - The error is `RefreshRejected`.
    /// - The stored credential is removed.
    /// - The authorization flow is not started mid-call.
    #[tokio::test]
    async fn test_rejected_refresh_invalidates_stored_credential() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(stored("a-1", 1, Some("revoked"), "read"));
        let client = Arc::new(MockOAuthClient::new());
        client.push_refresh(Err(OAuthClientError::NoRefreshToken));
        let flow = Arc::new(MockAuthorizationFlow::new("flow-token"));

        let err =
            manager(&store, &client, Some(&flow)).acquire(&scopes(&["read"])).await.unwrap_err();

        assert!(matches!(err, CredentialError::RefreshRejected(_)));
        assert!(store.get(&key()).is_none());
        assert_eq!(flow.calls(), 0);
    }

    /// Validates the flow runs when nothing is stored, and is persisted.
    #[tokio::test]
    async fn test_missing_credential_runs_authorization_flow() {
        let store = Arc::new(MemoryCredentialStore::new());
        let client = Arc::new(MockOAuthClient::new());
        let flow = Arc::new(MockAuthorizationFlow::new("flow-token"));
        let manager = manager(&store, &client, Some(&flow));

        let first = manager.acquire(&scopes(&["read", "write"])).await.unwrap();
        let second = manager.acquire(&scopes(&["read"])).await.unwrap();

        assert_eq!(first.access_token, "flow-token");
        assert_eq!(second.access_token, "flow-token");
        assert_eq!(flow.calls(), 1);
        assert_eq!(store.save_calls(), 1);
        assert!(store.get(&key()).unwrap().covers(&scopes(&["read", "write"])));
    }

    /// Validates missing scopes force re-authorization.
    #[tokio::test]
    async fn test_missing_scope_triggers_reauthorization() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(stored("a-1", 3600, Some("r-1"), "read"));
        let client = Arc::new(MockOAuthClient::new());
        let flow = Arc::new(MockAuthorizationFlow::new("flow-token"));

        let credential = manager(&store, &client, Some(&flow))
            .acquire(&scopes(&["read", "write"]))
            .await
            .unwrap();

        assert_eq!(credential.access_token, "flow-token");
        assert_eq!(flow.calls(), 1);
        assert_eq!(client.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_flow_and_no_credential_is_not_authorized() {
        let store = Arc::new(MemoryCredentialStore::new());
        let client = Arc::new(MockOAuthClient::new());

        let err = manager(&store, &client, None).acquire(&scopes(&["read"])).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_empty_scopes_are_rejected() {
        let store = Arc::new(MemoryCredentialStore::new());
        let client = Arc::new(MockOAuthClient::new());

        let err = manager(&store, &client, None).acquire(&[]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Configuration(_)));
        assert_eq!(store.load_calls(), 0);
    }

    /// Validates invalidate clears storage and memory.
    ///
    /// Assertions:
    /// - After invalidation the flow runs again on the next acquire.
    #[tokio::test]
    async fn test_invalidate_forces_new_authorization() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(stored("a-1", 3600, Some("r-1"), "read"));
        let client = Arc::new(MockOAuthClient::new());
        let flow = Arc::new(MockAuthorizationFlow::new("flow-token"));
        let manager = manager(&store, &client, Some(&flow));

        assert_eq!(manager.acquire(&scopes(&["read"])).await.unwrap().access_token, "a-1");
        manager.invalidate().await.unwrap();
        assert!(manager.current().await.is_none());
        assert!(store.get(&key()).is_none());

        assert_eq!(manager.acquire(&scopes(&["read"])).await.unwrap().access_token, "flow-token");
        assert_eq!(flow.calls(), 1);
    }
}
