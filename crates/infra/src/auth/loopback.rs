//! Installed-application authorization over a loopback redirect
//!
//! Starts a one-shot HTTP listener on `127.0.0.1`, hands the user an
//! authorization URL, and exchanges the code that comes back on
//! `/callback`. The PKCE state must round-trip unchanged; callbacks with a
//! different state are refused and the flow keeps waiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use fieldsync_common::auth::{
    AuthorizationFlow, CredentialError, OAuthClientTrait, PkceChallenge, TokenResponse,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>Invalid or unexpected callback parameters.</p></body>
</html>"#;

type Announcer = Arc<dyn Fn(&str) + Send + Sync>;

/// [`AuthorizationFlow`] that waits for the browser redirect on loopback.
pub struct LoopbackAuthorizationFlow {
    timeout: Duration,
    announce: Announcer,
}

impl LoopbackAuthorizationFlow {
    /// The authorization URL is logged at `info`; use
    /// [`with_announcer`](Self::with_announcer) to open a browser instead.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            announce: Arc::new(|url: &str| {
                info!(url = %url, "Open this URL in a browser to authorize access");
            }),
        }
    }

    #[must_use]
    pub fn with_announcer<F>(mut self, announce: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.announce = Arc::new(announce);
        self
    }
}

#[async_trait]
impl AuthorizationFlow for LoopbackAuthorizationFlow {
    async fn authorize(
        &self,
        client: &dyn OAuthClientTrait,
        scopes: &[String],
    ) -> Result<TokenResponse, CredentialError> {
        let challenge = PkceChallenge::generate();
        let mut server = CallbackServer::start(challenge.state.clone()).await?;
        let redirect_uri = server.redirect_uri();

        let url = client
            .authorization_url(&redirect_uri, scopes, &challenge)
            .map_err(|err| CredentialError::Flow(format!("cannot build authorization URL: {err}")))?;
        (self.announce)(&url);

        let code = server.wait_for_code(self.timeout).await;
        server.shutdown().await;
        let code = code?;

        info!("authorization.code_received");
        client
            .exchange_code(&code, &redirect_uri, &challenge.code_verifier)
            .await
            .map_err(|err| CredentialError::Flow(format!("code exchange failed: {err}")))
    }
}

type CallbackResult = Result<String, String>;

struct CallbackState {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

impl CallbackState {
    fn resolve(&self, result: CallbackResult) {
        if let Some(sender) = self.sender.lock().take() {
            let _ = sender.send(result);
        }
    }
}

/// Loopback HTTP server that receives exactly one OAuth redirect.
struct CallbackServer {
    port: u16,
    receiver: oneshot::Receiver<CallbackResult>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    async fn start(expected_state: String) -> Result<Self, CredentialError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| {
            CredentialError::Flow(format!("failed to bind OAuth loopback server: {err}"))
        })?;
        let port = listener
            .local_addr()
            .map_err(|err| CredentialError::Flow(format!("failed to determine port: {err}")))?
            .port();

        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(CallbackState { expected_state, sender: Mutex::new(Some(sender)) });
        let app = Router::new().route("/callback", get(handle_callback)).with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %err, "OAuth callback server error");
            }
        });

        Ok(Self { port, receiver, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.port)
    }

    async fn wait_for_code(&mut self, timeout: Duration) -> Result<String, CredentialError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(Ok(code))) => Ok(code),
            Ok(Ok(Err(message))) => Err(CredentialError::Flow(message)),
            Ok(Err(_)) => Err(CredentialError::Flow("callback server stopped unexpectedly".into())),
            Err(_) => Err(CredentialError::Flow(format!(
                "no authorization callback within {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "OAuth callback server did not stop cleanly");
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    if let Some(reason) = params.get("error") {
        let detail = params.get("error_description").map_or(String::new(), |d| format!(": {d}"));
        state.resolve(Err(format!("authorization denied ({reason}){detail}")));
        return (StatusCode::OK, Html(FAILURE_PAGE));
    }

    match (params.get("code"), params.get("state")) {
        (Some(code), Some(returned)) if *returned == state.expected_state => {
            state.resolve(Ok(code.clone()));
            (StatusCode::OK, Html(SUCCESS_PAGE))
        }
        _ => {
            warn!("authorization.unexpected_callback");
            (StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
        }
    }
}
