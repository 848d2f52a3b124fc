//! Authenticated handle to the Drive REST API.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::auth::{AuthorizationFlow, Authenticator};
use crate::config::{DriveConfig, Endpoints};
use crate::credentials::{Credential, CredentialStore};
use crate::error::{DriveError, Result};

const USER_AGENT: &str = concat!("drive_embed/", env!("CARGO_PKG_VERSION"));

/// An authenticated session. It is read-only once built and valid for the
/// rest of the process; nothing refreshes it mid-flight.
#[derive(Clone)]
pub struct DriveSession {
    http: Client,
    access_token: String,
    endpoints: Endpoints,
}

impl fmt::Debug for DriveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveSession")
            .field("access_token", &"<redacted>")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl DriveSession {
    /// Build a session from an already valid credential.
    pub fn establish(credential: &Credential, endpoints: Endpoints) -> Result<Self> {
        if !credential.is_valid() {
            return Err(DriveError::AuthenticationError(
                "Cannot open a session with an expired or empty credential".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DriveError::ConnectionError(e.to_string()))?;

        Ok(Self {
            http,
            access_token: credential.token.clone(),
            endpoints,
        })
    }

    /// Load, refresh or authorize a credential as needed, persist it, then
    /// open the session.
    pub async fn connect(config: &DriveConfig, flow: &dyn AuthorizationFlow) -> Result<Self> {
        let store =
            CredentialStore::for_api(&config.token_dir, &config.api_name, &config.api_version);
        let authenticator = Authenticator::new(store, config.scopes.clone());
        let credential = authenticator.credential(flow).await?;

        let session = Self::establish(&credential, config.endpoints.clone())?;
        tracing::info!("{} service created successfully", config.api_name);
        Ok(session)
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.endpoints.api_base, path))
            .bearer_auth(&self.access_token)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.endpoints.api_base, path))
            .bearer_auth(&self.access_token)
    }

    pub(crate) fn post_upload(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.endpoints.upload_base, path))
            .bearer_auth(&self.access_token)
    }

    /// Request against an absolute URL handed out by the API (resumable
    /// upload sessions).
    pub(crate) fn put_absolute(&self, url: &str) -> RequestBuilder {
        self.http.put(url).bearer_auth(&self.access_token)
    }
}
