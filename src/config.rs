//! Runtime configuration.

use std::path::PathBuf;

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Full Drive access scope.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// REST endpoints a session talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Point both endpoints at another host, keeping Google's path layout.
    pub fn with_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            api_base: format!("{}/drive/v3", host),
            upload_base: format!("{}/upload/drive/v3", host),
        }
    }
}

/// Everything needed to authorize and open a Drive session.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// OAuth client secrets file used by the interactive flow.
    pub client_secret_path: PathBuf,
    pub api_name: String,
    pub api_version: String,
    pub scopes: Vec<String>,
    /// Default parent for folder creation and uploads.
    pub root_folder: Option<String>,
    /// Directory holding the cached `token_{api}_{version}.json`.
    pub token_dir: PathBuf,
    pub endpoints: Endpoints,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_secret_path: PathBuf::from("credentials.json"),
            api_name: "drive".to_string(),
            api_version: "v3".to_string(),
            scopes: vec![DRIVE_SCOPE.to_string()],
            root_folder: None,
            token_dir: PathBuf::from("."),
            endpoints: Endpoints::default(),
        }
    }
}

impl DriveConfig {
    pub fn root_folder(&self) -> Option<&str> {
        self.root_folder.as_deref()
    }
}
