//! Authenticated API client with retry and re-authorization
//!
//! Every send is preceded by a fresh credential lookup, so a token that
//! expired while backing off is refreshed before the next attempt.
//!
//! # Retry rules
//!
//! - 5xx, 429, connection failures and timeouts back off and retry until
//!   `max_attempts` sends have been made
//! - `Retry-After` (seconds) on 429/503 replaces the computed delay, capped at
//!   the backoff maximum
//! - The first 401 invalidates the credential and replays the request without
//!   consuming an attempt; a second 401 is final
//! - Any other 4xx is final

use std::sync::Arc;
use std::time::Duration;

use fieldsync_common::auth::CredentialSource;
use fieldsync_common::resilience::{RetryConfig, RetryDecision};
use fieldsync_domain::SyncError;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::errors::ApiError;
use crate::http::HttpClient;

/// A request that was accepted.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub status: StatusCode,
    pub body: String,
    /// Sends counted against the retry budget (re-authorization replays excluded).
    pub attempts: u32,
}

/// A request that was given up on.
#[derive(Debug, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct DeliveryFailure {
    #[source]
    pub error: ApiError,
    pub attempts: u32,
}

impl From<DeliveryFailure> for SyncError {
    fn from(failure: DeliveryFailure) -> Self {
        failure.error.into()
    }
}

/// Sends bearer-authenticated requests with the retry rules above.
pub struct ApiClient {
    http: HttpClient,
    credentials: Arc<dyn CredentialSource>,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(http: HttpClient, credentials: Arc<dyn CredentialSource>, retry: RetryConfig) -> Self {
        Self { http, credentials, retry }
    }

    /// Sends the request produced by `build` until it succeeds or a final
    /// error is reached. `build` is called once per send.
    #[instrument(skip(self, scopes, build), fields(endpoint = %endpoint))]
    pub async fn execute<F>(
        &self,
        endpoint: &str,
        scopes: &[String],
        build: F,
    ) -> Result<Delivery, DeliveryFailure>
    where
        F: Fn(&HttpClient) -> RequestBuilder + Send + Sync,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut sends = 0u32;
        let mut replayed = false;

        loop {
            let counted = sends - u32::from(replayed);
            let credential = self
                .credentials
                .acquire(scopes)
                .await
                .map_err(|err| DeliveryFailure { error: err.into(), attempts: counted })?;

            let request = build(&self.http).bearer_auth(credential.bearer());
            sends += 1;
            let attempts = sends - u32::from(replayed);

            let outcome = match self.http.send(request).await {
                Ok(response) => Self::read_response(response, endpoint).await,
                Err(err) => Err(err),
            };

            let error = match outcome {
                Ok((status, body)) => {
                    debug!(%status, attempts, "api.request_succeeded");
                    return Ok(Delivery { status, body, attempts });
                }
                Err(error) => error,
            };

            match error {
                ApiError::Auth(message) if !replayed => {
                    warn!(attempts, "api.unauthorized_reauthorizing");
                    replayed = true;
                    self.credentials.invalidate().await.map_err(|err| DeliveryFailure {
                        error: err.into(),
                        attempts,
                    })?;
                    debug!(message = %message, "api.credential_invalidated");
                }
                ApiError::Auth(message) => {
                    return Err(DeliveryFailure {
                        error: ApiError::Auth(format!(
                            "still unauthorized after re-authorization: {message}"
                        )),
                        attempts,
                    });
                }
                error if error.should_retry() && attempts < max_attempts => {
                    let decision =
                        error.retry_after().map_or(RetryDecision::Retry, RetryDecision::RetryAfter);
                    let delay =
                        self.retry.delay_for_decision(&decision, attempts - 1).unwrap_or_default();
                    warn!(
                        attempts,
                        max_attempts,
                        status = ?error.status(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "api.retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                error => {
                    warn!(attempts, status = ?error.status(), error = %error, "api.request_failed");
                    return Err(DeliveryFailure { error, attempts });
                }
            }
        }
    }

    async fn read_response(response: Response, endpoint: &str) -> Result<(StatusCode, String), ApiError> {
        let status = response.status();
        let retry_after = parse_retry_after(&response);

        if status.is_success() {
            let body = response.text().await.map_err(|err| ApiError::Network(err.to_string()))?;
            return Ok((status, body));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, endpoint, &body, retry_after))
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fieldsync_common::testing::StaticCredentialSource;
    use reqwest::Method;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .exponential_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(20))
            .no_jitter()
            .build()
            .unwrap()
    }

    fn client(credentials: Arc<StaticCredentialSource>, max_attempts: u32) -> ApiClient {
        ApiClient::new(HttpClient::new().unwrap(), credentials, fast_retry(max_attempts))
    }

    fn scopes() -> Vec<String> {
        vec!["users.write".to_string()]
    }

    async fn get(client: &ApiClient, url: &str) -> Result<Delivery, DeliveryFailure> {
        client.execute(url, &scopes(), |http| http.request(Method::GET, url)).await
    }

    #[tokio::test]
    async fn sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["token-1"]));
        let delivery = get(&client(credentials.clone(), 3), &format!("{}/items", server.uri()))
            .await
            .unwrap();

        assert_eq!(delivery.status, StatusCode::OK);
        assert_eq!(delivery.attempts, 1);
        assert_eq!(credentials.acquire_calls(), 1);
    }

    #[tokio::test]
    async fn retries_server_errors_up_to_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["token-1"]));
        let failure = get(&client(credentials.clone(), 4), &server.uri()).await.unwrap_err();

        assert_eq!(failure.attempts, 4);
        assert_eq!(failure.error.status(), Some(500));
        assert_eq!(credentials.acquire_calls(), 4);
    }

    #[tokio::test]
    async fn honors_retry_after_on_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["token-1"]));
        let delivery = get(&client(credentials, 3), &server.uri()).await.unwrap();

        assert_eq!(delivery.attempts, 2);
    }

    #[tokio::test]
    async fn client_errors_fail_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad field"))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["token-1"]));
        let failure = get(&client(credentials, 5), &server.uri()).await.unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert!(matches!(failure.error, ApiError::Client { status: 422, .. }));
    }

    /// Validates a single re-authorization on 401.
    ///
    /// Assertions:
    /// - The stale token is invalidated exactly once
    /// - The replay carries the new token
    /// - The replay does not consume an attempt
    #[tokio::test]
    async fn reauthorizes_once_after_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["stale", "fresh"]));
        let delivery = get(&client(credentials.clone(), 3), &server.uri()).await.unwrap();

        assert_eq!(delivery.attempts, 1);
        assert_eq!(credentials.invalidate_calls(), 1);
    }

    #[tokio::test]
    async fn second_401_is_final() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["stale", "also-stale"]));
        let failure = get(&client(credentials.clone(), 5), &server.uri()).await.unwrap_err();

        assert!(matches!(failure.error, ApiError::Auth(_)));
        assert_eq!(credentials.invalidate_calls(), 1);
        assert!(matches!(SyncError::from(failure), SyncError::Authorization(_)));
    }

    #[tokio::test]
    async fn credential_failure_stops_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let credentials = Arc::new(StaticCredentialSource::new(["token"]));
        credentials.deny("consent withdrawn");
        let failure = get(&client(credentials, 3), &server.uri()).await.unwrap_err();

        assert_eq!(failure.attempts, 0);
        assert!(matches!(failure.error, ApiError::Credential(_)));
    }
}
