//! Mock implementations of the auth traits
//!
//! In-memory stand-ins for the credential store, OAuth client, authorization
//! flow and credential source. Each records how often it was called so tests
//! can assert on interaction counts.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::client::OAuthClientError;
use crate::auth::credential_manager::CredentialError;
use crate::auth::pkce::PkceChallenge;
use crate::auth::traits::{AuthorizationFlow, CredentialSource, CredentialStore, OAuthClientTrait};
use crate::auth::types::{Credential, CredentialKey, TokenResponse};

fn bearer_response(access_token: &str, refresh_token: Option<&str>) -> TokenResponse {
    TokenResponse {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        token_type: "Bearer".to_string(),
        expires_in: Some(3600),
        scope: None,
    }
}

/// Builds a credential valid for an hour covering `scopes`.
pub fn credential_fixture(key: &CredentialKey, access_token: &str, scopes: &[String]) -> Credential {
    Credential::from_token_response(
        key.clone(),
        bearer_response(access_token, Some("fixture-refresh")),
        scopes,
    )
}

/// Credential store backed by a map.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<CredentialKey, Credential>>,
    fail_saves: Mutex<bool>,
    load_calls: AtomicUsize,
    save_calls: AtomicUsize,
    invalidate_calls: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a credential under its own key.
    pub fn insert(&self, credential: Credential) {
        self.entries.lock().insert(credential.key.clone(), credential);
    }

    pub fn get(&self, key: &CredentialKey) -> Option<Credential> {
        self.entries.lock().get(key).cloned()
    }

    /// Makes every subsequent `save` fail.
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn invalidate_calls(&self) -> usize {
        self.invalidate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, key: &CredentialKey) -> Result<Option<Credential>, CredentialError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(key))
    }

    async fn save(&self, key: &CredentialKey, credential: &Credential) -> Result<(), CredentialError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_saves.lock() {
            return Err(CredentialError::Store("mock store refuses writes".to_string()));
        }
        self.entries.lock().insert(key.clone(), credential.clone());
        Ok(())
    }

    async fn invalidate(&self, key: &CredentialKey) -> Result<(), CredentialError> {
        self.invalidate_calls.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// OAuth client with scripted refresh results.
///
/// Queued results are returned in order; once the queue is empty every
/// refresh succeeds with a new `refreshed-N` token.
#[derive(Default)]
pub struct MockOAuthClient {
    refresh_results: Mutex<VecDeque<Result<TokenResponse, OAuthClientError>>>,
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
}

impl MockOAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_refresh(&self, result: Result<TokenResponse, OAuthClientError>) {
        self.refresh_results.lock().push_back(result);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        challenge: &PkceChallenge,
    ) -> Result<String, OAuthClientError> {
        Ok(format!(
            "https://auth.example.test/authorize?redirect_uri={}&scope={}&state={}",
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            challenge.state
        ))
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
        _code_verifier: &str,
    ) -> Result<TokenResponse, OAuthClientError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(bearer_response(&format!("exchanged-{code}"), Some("exchanged-refresh")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthClientError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }
        let scripted = self.refresh_results.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(bearer_response(&format!("refreshed-{call}"), None)))
    }
}

/// Authorization flow that completes immediately with a fixed token.
pub struct MockAuthorizationFlow {
    access_token: String,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockAuthorizationFlow {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), failure: None, calls: AtomicUsize::new(0) }
    }

    /// A flow the user never completes.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { access_token: String::new(), failure: Some(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationFlow for MockAuthorizationFlow {
    async fn authorize(
        &self,
        _client: &dyn OAuthClientTrait,
        _scopes: &[String],
    ) -> Result<TokenResponse, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(CredentialError::Flow(message.clone())),
            None => Ok(bearer_response(&self.access_token, Some("flow-refresh"))),
        }
    }
}

/// Credential source handing out a fixed sequence of access tokens.
///
/// `acquire` returns the current token; `invalidate` advances to the next
/// one (the last token repeats once the sequence runs out).
pub struct StaticCredentialSource {
    key: CredentialKey,
    tokens: Mutex<VecDeque<String>>,
    denied: Mutex<Option<String>>,
    acquire_calls: AtomicUsize,
    invalidate_calls: AtomicUsize,
}

impl StaticCredentialSource {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: CredentialKey::new("test-api", "test-app"),
            tokens: Mutex::new(tokens.into_iter().map(Into::into).collect()),
            denied: Mutex::new(None),
            acquire_calls: AtomicUsize::new(0),
            invalidate_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every subsequent `acquire` fail as not authorized.
    pub fn deny(&self, message: impl Into<String>) {
        *self.denied.lock() = Some(message.into());
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn invalidate_calls(&self) -> usize {
        self.invalidate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentialSource {
    async fn acquire(&self, scopes: &[String]) -> Result<Credential, CredentialError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.denied.lock().clone() {
            return Err(CredentialError::NotAuthorized(message));
        }
        let token = self
            .tokens
            .lock()
            .front()
            .cloned()
            .ok_or_else(|| CredentialError::NotAuthorized("no tokens configured".to_string()))?;
        Ok(credential_fixture(&self.key, &token, scopes))
    }

    async fn invalidate(&self) -> Result<(), CredentialError> {
        self.invalidate_calls.fetch_add(1, Ordering::SeqCst);
        let mut tokens = self.tokens.lock();
        if tokens.len() > 1 {
            tokens.pop_front();
        }
        Ok(())
    }
}
