//! Google Drive API client: folders, listing, links, uploads and sharing.

use std::path::{Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::error::{DriveError, Result};
use crate::models::{
    ApiErrorResponse, FileLinks, FileListResponse, PermissionRequest, RemoteFile,
    FOLDER_MIME_TYPE,
};
use crate::session::DriveSession;

/// Metadata fields requested for every file the client returns.
const FILE_FIELDS: &str = "id, name, parents, mimeType, size, webViewLink, webContentLink";

/// Uploads larger than this use a resumable session by default.
pub const RESUMABLE_THRESHOLD: u64 = 500 * 1024 * 1024;

/// Characters left as is in a file id path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Client for a single Drive session.
pub struct DriveClient {
    session: DriveSession,
    staging_dir: Option<PathBuf>,
    resumable_threshold: u64,
}

impl DriveClient {
    pub fn new(session: DriveSession) -> Self {
        Self {
            session,
            staging_dir: None,
            resumable_threshold: RESUMABLE_THRESHOLD,
        }
    }

    /// Stage temporary upload files in `dir` instead of the system
    /// temporary directory.
    pub fn with_staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Send payloads larger than `bytes` through a resumable session.
    pub fn with_resumable_threshold(mut self, bytes: u64) -> Self {
        self.resumable_threshold = bytes;
        self
    }

    pub(crate) fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }

    /// List the non-trashed children of a folder.
    ///
    /// An empty folder yields an empty vector; a failed call is a
    /// [`DriveError::QueryError`].
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let query = format!("'{}' in parents and trashed = false", escape_query_value(folder_id));
        self.query_files(&query).await
    }

    /// Query files using Google Drive query syntax, following every page.
    pub async fn query_files(&self, query: &str) -> Result<Vec<RemoteFile>> {
        tracing::debug!(query, "querying files");
        self.fetch_all_pages(query)
            .await
            .map_err(|e| DriveError::query(query, e))
    }

    async fn fetch_all_pages(&self, query: &str) -> Result<Vec<RemoteFile>> {
        let fields = format!("nextPageToken, files({})", FILE_FIELDS);
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.session.get("/files").query(&[
                ("q", query),
                ("spaces", "drive"),
                ("fields", fields.as_str()),
            ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let list_response: FileListResponse = parse_response(request.send().await?).await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    /// Whether a non-trashed folder named exactly `name` exists, optionally
    /// restricted to children of `parent_id`. The name comparison is
    /// case-sensitive.
    pub async fn folder_exists(&self, name: &str, parent_id: Option<&str>) -> Result<bool> {
        let mut query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(name),
            FOLDER_MIME_TYPE
        );
        if let Some(parent_id) = parent_id {
            query.push_str(&format!(" and '{}' in parents", escape_query_value(parent_id)));
        }

        let folders = self.query_files(&query).await?;
        Ok(folders.iter().any(|folder| folder.name == name))
    }

    /// Create a single folder.
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<RemoteFile> {
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent_id) = parent_id {
            metadata["parents"] = serde_json::json!([parent_id]);
        }

        let response = self
            .session
            .post("/files")
            .query(&[("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Create one folder per name, in order.
    ///
    /// Stops at the first failure with [`DriveError::FolderBatchAborted`],
    /// which carries the ids of the folders created before it.
    pub async fn create_folders<S: AsRef<str>>(
        &self,
        names: &[S],
        parent_id: Option<&str>,
    ) -> Result<Vec<RemoteFile>> {
        let mut created = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref();
            match self.create_folder(name, parent_id).await {
                Ok(folder) => created.push(folder),
                Err(source) => {
                    tracing::warn!(folder = name, error = %source, "folder creation failed");
                    return Err(DriveError::FolderBatchAborted {
                        failed: name.to_string(),
                        created: created.into_iter().map(|f| f.id).collect(),
                        source: Box::new(source),
                    });
                }
            }
        }

        tracing::info!(count = created.len(), "Folders created successfully");
        Ok(created)
    }

    /// View and download links of a file.
    pub async fn get_file_links(&self, file_id: &str) -> Result<FileLinks> {
        let response = self
            .session
            .get(&file_path(file_id))
            .query(&[("fields", "webViewLink, webContentLink")])
            .send()
            .await?;

        parse_response(response).await.map_err(|e| match e {
            DriveError::ApiError { status: 404, .. } => DriveError::FileNotFound(file_id.to_string()),
            other => other,
        })
    }

    /// Upload a local file as a new file named `name` under `parent_id`.
    ///
    /// The mime type is guessed from `name` when not given. Payloads above
    /// the resumable threshold (500 MB unless configured) go through a
    /// resumable session, smaller ones in a single multipart request.
    pub async fn upload_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        name: &str,
        parent_id: &str,
        mime_type: Option<&str>,
    ) -> Result<RemoteFile> {
        let mime_type = mime_type.map_or_else(
            || mime_guess::from_path(name).first_or_octet_stream().to_string(),
            str::to_string,
        );
        let content = tokio::fs::read(local_path.as_ref()).await?;
        let metadata = serde_json::json!({ "name": name, "parents": [parent_id] });

        tracing::info!(name, parent_id, size = content.len(), "Uploading '{}' to Google Drive", name);

        if content.len() as u64 > self.resumable_threshold {
            self.send_resumable(metadata, content, &mime_type).await
        } else {
            self.send_multipart(metadata, content, name, &mime_type).await
        }
    }

    async fn send_multipart(
        &self,
        metadata: serde_json::Value,
        content: Vec<u8>,
        name: &str,
        mime_type: &str,
    ) -> Result<RemoteFile> {
        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json")?,
            )
            .part(
                "file",
                Part::bytes(content)
                    .file_name(name.to_string())
                    .mime_str(mime_type)?,
            );

        let response = self
            .session
            .post_upload("/files")
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .multipart(form)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Open a resumable session, then PUT the whole payload to it.
    async fn send_resumable(
        &self,
        metadata: serde_json::Value,
        content: Vec<u8>,
        mime_type: &str,
    ) -> Result<RemoteFile> {
        let length = content.len().to_string();

        let session_response = self
            .session
            .post_upload("/files")
            .query(&[("uploadType", "resumable")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", &length)
            .json(&metadata)
            .send()
            .await?;

        if !session_response.status().is_success() {
            return Err(api_error(session_response).await);
        }

        let Some(session_url) = session_response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
        else {
            return Err(DriveError::ApiError {
                status: session_response.status().as_u16(),
                message: "Resumable session has no Location header".to_string(),
            });
        };

        let response = self
            .session
            .put_absolute(&session_url)
            .query(&[("fields", FILE_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(content)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Give `email` read access to a file.
    pub async fn share_with_reader(&self, file_id: &str, email: &str) -> Result<()> {
        let response = self
            .session
            .post(&format!("{}/permissions", file_path(file_id)))
            .query(&[("sendNotificationEmail", "true")])
            .json(&PermissionRequest::reader(email))
            .send()
            .await?;

        let _: serde_json::Value = parse_response(response).await?;
        tracing::info!(file_id, email, "granted read permission");
        Ok(())
    }
}

/// `/files/{id}` with the id encoded as a single path segment.
fn file_path(file_id: &str) -> String {
    format!("/files/{}", utf8_percent_encode(file_id, PATH_SEGMENT))
}

/// Escape a value for use inside a single-quoted Drive query string.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(response.json().await?)
}

async fn api_error(response: Response) -> DriveError {
    let status = response.status();
    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return DriveError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        };
    }
    DriveError::ApiError {
        status: status.as_u16(),
        message: error_body,
    }
}
