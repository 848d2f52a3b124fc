//! OAuth2 user authorization for Google APIs.
//!
//! A cached [`Credential`] is reused while valid, refreshed through the
//! token endpoint when it carries a refresh token, and otherwise obtained
//! from an [`AuthorizationFlow`] (normally the browser-based
//! [`InstalledAppFlow`]). Every new credential is persisted before use.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use url::Url;
use uuid::Uuid;

use crate::credentials::{Credential, CredentialStore};
use crate::error::{DriveError, Result};
use crate::models::{ClientSecrets, ClientSecretsFile, TokenResponse};

/// Google OAuth2 consent endpoint.
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// How long the redirect server may take to finish answering the browser.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

const SUCCESS_PAGE: &str = "<html><body>The authentication flow has completed. You may close this window.</body></html>";

/// Obtains a brand new credential from the user.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    async fn authorize(&self, scopes: &[String]) -> Result<Credential>;
}

/// Applies the refresh policy on top of a [`CredentialStore`].
pub struct Authenticator {
    store: CredentialStore,
    scopes: Vec<String>,
    http: Client,
}

impl Authenticator {
    pub fn new(store: CredentialStore, scopes: Vec<String>) -> Self {
        Self {
            store,
            scopes,
            http: Client::new(),
        }
    }

    /// Return a valid credential.
    ///
    /// The cached credential is used as is when valid. Otherwise it is
    /// refreshed if it has a refresh token, and `flow` runs only when it
    /// does not (or nothing is cached). Refresh failures are not retried
    /// and do not fall back to `flow`.
    pub async fn credential(&self, flow: &dyn AuthorizationFlow) -> Result<Credential> {
        let cached = self.store.load()?;

        if let Some(credential) = cached.as_ref().filter(|c| c.is_valid()) {
            tracing::debug!("using cached credential");
            return Ok(credential.clone());
        }

        let fresh = match cached.as_ref().filter(|c| c.refresh_token().is_some()) {
            Some(credential) => {
                tracing::info!("Refreshing expired access token");
                refresh_credential(&self.http, credential).await?
            }
            None => {
                tracing::info!("No usable credential, starting authorization flow");
                flow.authorize(&self.scopes).await?
            }
        };

        self.store.save(&fresh)?;
        Ok(fresh)
    }
}

/// Exchange the refresh token of `credential` for a new access token.
pub async fn refresh_credential(http: &Client, credential: &Credential) -> Result<Credential> {
    let refresh_token = credential.refresh_token().ok_or_else(|| {
        DriveError::TokenRefreshError("credential has no refresh token".to_string())
    })?;

    let response = request_token(
        http,
        &credential.token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
        ],
    )
    .await?;

    Ok(credential_from_response(
        response,
        credential.refresh_token.clone(),
        &credential.token_uri,
        &credential.client_id,
        &credential.client_secret,
        &credential.scopes,
    ))
}

async fn request_token(
    http: &Client,
    token_uri: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(token_uri)
        .form(params)
        .send()
        .await
        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| DriveError::TokenRefreshError(e.to_string()))
}

fn credential_from_response(
    response: TokenResponse,
    previous_refresh_token: Option<String>,
    token_uri: &str,
    client_id: &str,
    client_secret: &str,
    requested_scopes: &[String],
) -> Credential {
    let scopes = match response.scope {
        Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
        None => requested_scopes.to_vec(),
    };

    Credential {
        token: response.access_token,
        // Google only returns a refresh token on the first exchange.
        refresh_token: response.refresh_token.or(previous_refresh_token),
        token_uri: token_uri.to_string(),
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        scopes,
        expiry: Some(expiry_after(response.expires_in)),
    }
}

/// Expiry for a token issued now. Missing or out-of-range lifetimes fall
/// back to one hour.
fn expiry_after(expires_in: Option<u64>) -> DateTime<Utc> {
    let now = Utc::now();
    expires_in
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| now + Duration::seconds(DEFAULT_EXPIRES_IN))
}

/// Read the `installed` (or `web`) section of a client secrets file.
pub fn load_client_secrets<P: AsRef<Path>>(path: P) -> Result<ClientSecrets> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| DriveError::CredentialsFileError {
        path: path.display().to_string(),
        source,
    })?;
    let file: ClientSecretsFile =
        serde_json::from_str(&content).map_err(|source| DriveError::CredentialsParseError {
            path: path.display().to_string(),
            source,
        })?;

    file.installed.or(file.web).ok_or_else(|| {
        DriveError::AuthenticationError(format!(
            "{} has neither an 'installed' nor a 'web' client",
            path.display()
        ))
    })
}

enum SecretsSource {
    Loaded(ClientSecrets),
    File(PathBuf),
}

/// Browser-based authorization with a loopback redirect.
pub struct InstalledAppFlow {
    source: SecretsSource,
    http: Client,
    open_browser: bool,
}

impl InstalledAppFlow {
    pub fn new(secrets: ClientSecrets) -> Self {
        Self::with_source(SecretsSource::Loaded(secrets))
    }

    /// Flow backed by a client secrets file. The file is only read when
    /// authorization is actually needed, so a cached token works without it.
    pub fn from_client_secrets_file<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_source(SecretsSource::File(path.into()))
    }

    fn with_source(source: SecretsSource) -> Self {
        Self {
            source,
            http: Client::new(),
            open_browser: true,
        }
    }

    /// Only log the consent URL instead of launching a browser.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    fn secrets(&self) -> Result<Cow<'_, ClientSecrets>> {
        match &self.source {
            SecretsSource::Loaded(secrets) => Ok(Cow::Borrowed(secrets)),
            SecretsSource::File(path) => load_client_secrets(path).map(Cow::Owned),
        }
    }

    /// Consent URL asking for offline access, so a refresh token is issued.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> Result<String> {
        let secrets = self.secrets()?;
        let scope = scopes.join(" ");
        let url = Url::parse_with_params(
            secrets.auth_uri.as_deref().unwrap_or(AUTH_URI),
            &[
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| DriveError::AuthenticationError(format!("Invalid auth URL: {}", e)))?;

        Ok(url.to_string())
    }

    /// Exchange an authorization code for a credential.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<Credential> {
        let secrets = self.secrets()?;
        let token_uri = secrets.token_uri.as_deref().unwrap_or(TOKEN_URI);
        let response = request_token(
            &self.http,
            token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
            ],
        )
        .await?;

        Ok(credential_from_response(
            response,
            None,
            token_uri,
            &secrets.client_id,
            &secrets.client_secret,
            scopes,
        ))
    }
}

#[async_trait]
impl AuthorizationFlow for InstalledAppFlow {
    async fn authorize(&self, scopes: &[String]) -> Result<Credential> {
        // Fail on missing secrets before anything is opened.
        self.secrets()?;

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            DriveError::AuthenticationError(format!("Failed to bind loopback listener: {}", e))
        })?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());
        let state = Uuid::new_v4().simple().to_string();
        let url = self.authorization_url(&redirect_uri, scopes, &state)?;

        tracing::info!("Please visit this URL to authorize this application: {}", url);
        if self.open_browser {
            if let Err(e) = open::that(&url) {
                tracing::warn!(error = %e, "could not open a browser");
            }
        }

        let code = wait_for_code(listener, &state).await?;
        self.exchange_code(&code, &redirect_uri, scopes).await
    }
}

#[derive(Debug, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: mpsc::Sender<Result<String>>,
}

/// Serve the loopback redirect until it carries a code (or an error).
///
/// Connections are served concurrently, so idle browser preconnects do not
/// hold up the redirect.
pub(crate) async fn wait_for_code(listener: TcpListener, state: &str) -> Result<String> {
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let app = Router::new()
        .route("/", get(receive_redirect))
        .with_state(RedirectState {
            expected_state: Arc::from(state),
            outcome: outcome_tx,
        });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = tokio::select! {
        received = outcome_rx.recv() => received.unwrap_or_else(|| {
            Err(DriveError::AuthenticationError("Redirect listener closed".to_string()))
        }),
        stopped = &mut server => {
            let reason = match stopped {
                Ok(Ok(())) => "stopped".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };
            return Err(DriveError::AuthenticationError(format!(
                "Redirect listener failed: {}",
                reason
            )));
        }
    };

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
        server.abort();
    }

    outcome
}

async fn receive_redirect(
    State(redirect): State<RedirectState>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, Html<String>) {
    let outcome = match (params.error, params.code) {
        (None, None) => return (StatusCode::NOT_FOUND, Html(String::new())),
        (Some(error), _) => Err(DriveError::AuthenticationError(format!(
            "Authorization denied: {}",
            error
        ))),
        (None, Some(_)) if params.state.as_deref() != Some(&*redirect.expected_state) => Err(
            DriveError::AuthenticationError("State mismatch in authorization response".to_string()),
        ),
        (None, Some(code)) => Ok(code),
    };

    let reply = match &outcome {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_PAGE.to_string())),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(format!("<html><body>{}</body></html>", e)),
        ),
    };

    // Only the first outcome is consumed; later redirects are answered but dropped.
    let _ = redirect.outcome.try_send(outcome);
    reply
}
