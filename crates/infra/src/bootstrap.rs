//! Service wiring - builds a ready-to-run pipeline from [`AppSettings`]

use std::sync::Arc;

use fieldsync_common::auth::{
    CredentialKey, CredentialManager, CredentialSource, OAuthClient, OAuthConfig,
};
use fieldsync_common::resilience::RetryConfig;
use fieldsync_core::{FieldValue, SyncObserver, SyncPipeline, SyncReport};
use fieldsync_domain::{AppSettings, OAuthSettings, RetrySettings, SyncError, SyncTarget};
use tracing::info;
use url::Url;

use crate::api::{ApiClient, PaginatedReader, UpdateSubmitter};
use crate::auth::LoopbackAuthorizationFlow;
use crate::credentials::FileCredentialStore;
use crate::http::HttpClient;

/// Translate configured retry limits into the shared backoff curve.
///
/// # Errors
/// Returns `SyncError::Configuration` if the limits are unusable.
pub fn retry_config_from(settings: &RetrySettings) -> Result<RetryConfig, SyncError> {
    let builder = RetryConfig::builder().max_attempts(settings.max_attempts).exponential_backoff(
        settings.base_backoff(),
        2.0,
        settings.max_backoff(),
    );
    let builder = if settings.jitter { builder.equal_jitter() } else { builder.no_jitter() };

    builder.build().map_err(|err| SyncError::Configuration(err.to_string()))
}

fn oauth_config_from(settings: &OAuthSettings) -> Result<OAuthConfig, SyncError> {
    require_url("oauth.authorization_endpoint", &settings.authorization_endpoint)?;
    require_url("oauth.token_endpoint", &settings.token_endpoint)?;

    let mut config = OAuthConfig::new(
        settings.client_id.clone(),
        settings.authorization_endpoint.clone(),
        settings.token_endpoint.clone(),
    );
    config.client_secret = settings.client_secret.clone();
    config.extra_authorize_params = settings
        .extra_authorize_params
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Ok(config)
}

fn require_url(name: &str, value: &str) -> Result<Url, SyncError> {
    let url = Url::parse(value)
        .map_err(|err| SyncError::Configuration(format!("{name} is not a valid URL: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::Configuration(format!("{name} uses unsupported scheme '{other}'"))),
    }
}

/// A configured credential manager and pipeline for one target.
pub struct SyncService {
    target: SyncTarget,
    credentials: Arc<CredentialManager>,
    pipeline: SyncPipeline,
}

impl SyncService {
    /// Validates `settings` and wires every component. No network I/O
    /// happens here; the credential store directory is created and locked.
    ///
    /// # Errors
    /// Returns `SyncError::Configuration` for invalid settings and
    /// `SyncError::Storage` if the credential store cannot be opened.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, SyncError> {
        settings.validate()?;
        require_url("target.read.url", &settings.target.read.url)?;
        require_url("target.write.url", &settings.target.write.url)?;

        let retry = retry_config_from(&settings.sync.retry)?;

        let oauth = OAuthClient::new(oauth_config_from(&settings.oauth)?)
            .map_err(|err| SyncError::Configuration(err.to_string()))?;
        let store = FileCredentialStore::open(&settings.credentials.dir)
            .map_err(|err| SyncError::Storage(err.to_string()))?;
        let flow = LoopbackAuthorizationFlow::new(settings.oauth.callback_timeout());

        let credentials = Arc::new(
            CredentialManager::new(
                CredentialKey::new(&settings.credentials.api, &settings.credentials.application),
                Arc::new(oauth),
                Arc::new(store),
            )
            .with_flow(Arc::new(flow))
            .with_retry(retry.clone())
            .with_refresh_leeway(settings.sync.refresh_leeway_secs),
        );
        let source: Arc<dyn CredentialSource> = credentials.clone();

        let http = HttpClient::builder()
            .timeout(settings.sync.request_timeout())
            .build()
            .map_err(SyncError::from)?;
        let api = Arc::new(ApiClient::new(http, source.clone(), retry));
        let reader = Arc::new(PaginatedReader::new(api.clone(), settings.sync.max_pages));
        let submitter = Arc::new(UpdateSubmitter::new(api));

        let pipeline = SyncPipeline::new(source, reader, submitter, &settings.sync)?;
        info!(
            target = %settings.target.name,
            credential = %credentials.key(),
            max_batch_size = settings.sync.max_batch_size,
            "sync service ready"
        );

        Ok(Self { target: settings.target.clone(), credentials, pipeline })
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.pipeline = self.pipeline.with_observer(observer);
        self
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Sets `field` to `value` on every record of the configured target.
    ///
    /// # Errors
    /// See [`SyncPipeline::run`].
    pub async fn run(&self, field: &str, value: &FieldValue) -> Result<SyncReport, SyncError> {
        self.pipeline.run(&self.target, field, value).await
    }
}
