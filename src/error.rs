//! Error types for the drive_embed crate.

use thiserror::Error;

/// Errors that can occur when talking to Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Failed to access credentials file {path}: {source}")]
    CredentialsFileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credentials JSON {path}: {source}")]
    CredentialsParseError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unable to connect: {0}")]
    ConnectionError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Upload of '{name}' failed: {source}")]
    UploadError {
        name: String,
        #[source]
        source: Box<DriveError>,
    },

    #[error("Query failed ({query}): {source}")]
    QueryError {
        query: String,
        #[source]
        source: Box<DriveError>,
    },

    #[error("Folder batch aborted at '{failed}' after {} folder(s) were created: {source}", .created.len())]
    FolderBatchAborted {
        failed: String,
        created: Vec<String>,
        #[source]
        source: Box<DriveError>,
    },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Zip archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),
}

/// Coarse classification of a [`DriveError`], for callers that only care
/// about which stage of the workflow failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Connection,
    NotFound,
    Upload,
    Query,
    Other,
}

impl DriveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriveError::AuthenticationError(_)
            | DriveError::TokenRefreshError(_)
            | DriveError::CredentialsFileError { .. }
            | DriveError::CredentialsParseError { .. } => ErrorKind::Auth,
            DriveError::ConnectionError(_) => ErrorKind::Connection,
            DriveError::FileNotFound(_) => ErrorKind::NotFound,
            DriveError::UploadError { .. } => ErrorKind::Upload,
            DriveError::QueryError { .. } | DriveError::FolderBatchAborted { .. } => {
                ErrorKind::Query
            }
            _ => ErrorKind::Other,
        }
    }

    pub(crate) fn upload(name: impl Into<String>, source: DriveError) -> Self {
        DriveError::UploadError {
            name: name.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn query(query: impl Into<String>, source: DriveError) -> Self {
        DriveError::QueryError {
            query: query.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
