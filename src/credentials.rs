//! On-disk cache of the authorized-user credential.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DriveError, Result};

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Authorized-user credential, stored in the same JSON layout Google's
/// client libraries use.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the access token is past (or within a minute of) its expiry.
    /// A credential without an expiry never expires.
    pub fn is_expired(&self) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry <= Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS))
    }

    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.is_expired()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Loads and saves a [`Credential`] at a path derived from the API it is for.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store for `dir/token_{api_name}_{api_version}.json`.
    pub fn for_api<P: AsRef<Path>>(dir: P, api_name: &str, api_version: &str) -> Self {
        Self::new(dir.as_ref().join(token_file_name(api_name, api_version)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached credential. A missing file is first run, not an error.
    pub fn load(&self) -> Result<Option<Credential>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no cached credential");
                return Ok(None);
            }
            Err(source) => {
                return Err(DriveError::CredentialsFileError {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };

        let credential =
            serde_json::from_str(&content).map_err(|source| DriveError::CredentialsParseError {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(Some(credential))
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let file_error = |source| DriveError::CredentialsFileError {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(file_error)?;
            }
        }

        let json = serde_json::to_string_pretty(credential)?;
        fs::write(&self.path, json).map_err(file_error)?;
        tracing::debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }
}

pub fn token_file_name(api_name: &str, api_version: &str) -> String {
    format!("token_{}_{}.json", api_name, api_version)
}
