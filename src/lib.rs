//! drive_embed - Google Drive storage for watermark embedding results.
//!
//! This library provides functionality to:
//! - Authorize against Google Drive with a cached, auto-refreshed user token
//! - Create folders and check whether a folder exists
//! - Upload the three images of an embedding run, individually and as a zip
//! - List folders and resolve view/download links
//!
//! # Example
//!
//! ```no_run
//! use drive_embed::{DriveClient, DriveConfig, DriveSession, InstalledAppFlow};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DriveConfig::default();
//!     let flow = InstalledAppFlow::from_client_secrets_file(&config.client_secret_path);
//!     let client = DriveClient::new(DriveSession::connect(&config, &flow).await?);
//!
//!     for file in client.list_files("folder-id").await? {
//!         let links = client.get_file_links(&file.id).await?;
//!         println!("{} {:?}", file.name, links.view);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod resource_id;
pub mod session;
pub mod staging;
pub mod upload;

// Re-exports for convenience
pub use auth::{AuthorizationFlow, Authenticator, InstalledAppFlow};
pub use client::DriveClient;
pub use config::{DriveConfig, Endpoints};
pub use credentials::{Credential, CredentialStore};
pub use error::{DriveError, ErrorKind, Result};
pub use models::{FileLinks, RemoteFile};
pub use resource_id::extract_id;
pub use session::DriveSession;
pub use upload::{EmbeddingImages, MixedUploadReport, UploadLabel};
