//! Data models for Google Drive API requests and responses.

use serde::{Deserialize, Serialize};

/// Mime type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A file or folder as known to Google Drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: Option<u64>,
}

impl RemoteFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

// Drive reports sizes as decimal strings.
fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| raw.parse::<u64>().map_err(serde::de::Error::custom))
        .transpose()
}

impl std::fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.size.map_or_else(|| "-".to_string(), format_size);
        write!(
            f,
            "{:<44} {:>10} {:<30} {}",
            self.id,
            size,
            self.mime_type.as_deref().unwrap_or("-"),
            self.name
        )
    }
}

/// Render a byte count with a binary unit, e.g. `1.50 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Shareable links of a remote file. Either may be missing depending on
/// the file's sharing settings and type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileLinks {
    #[serde(rename = "webViewLink", default)]
    pub view: Option<String>,
    #[serde(rename = "webContentLink", default)]
    pub download: Option<String>,
}

/// Response from the files.list API endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of a permissions.create call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub role: &'a str,
    pub email_address: &'a str,
}

impl<'a> PermissionRequest<'a> {
    /// Read-only access for a single user.
    pub fn reader(email_address: &'a str) -> Self {
        Self {
            kind: "user",
            role: "reader",
            email_address,
        }
    }
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// OAuth client registration, as found in the `installed` or `web`
/// section of a downloaded client secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Top level of a client secrets file.
#[derive(Debug, Deserialize)]
pub struct ClientSecretsFile {
    #[serde(default)]
    pub installed: Option<ClientSecrets>,
    #[serde(default)]
    pub web: Option<ClientSecrets>,
}

/// OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}
