//! Upload of a watermark embedding result: three images, each on its own
//! and all together in one zip.

use std::collections::BTreeMap;
use std::fmt;

use image::GrayImage;

use crate::client::DriveClient;
use crate::error::{DriveError, Result};
use crate::models::RemoteFile;
use crate::staging::{bundle_zip, encode_bmp, stage_bytes};

/// Remote name of the bundled archive.
pub const BUNDLE_FILE_NAME: &str = "embedding.zip";

const BMP_MIME_TYPE: &str = "image/bmp";
const ZIP_MIME_TYPE: &str = "application/zip";

/// One entry of a [`MixedUploadReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UploadLabel {
    WatermarkedImage,
    KeyImage,
    BlockPosition,
    EmbeddingZip,
}

impl UploadLabel {
    /// The three single-image labels, in upload order.
    pub const IMAGES: [UploadLabel; 3] = [
        UploadLabel::WatermarkedImage,
        UploadLabel::KeyImage,
        UploadLabel::BlockPosition,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UploadLabel::WatermarkedImage => "watermarked_image",
            UploadLabel::KeyImage => "key_image",
            UploadLabel::BlockPosition => "block_position",
            UploadLabel::EmbeddingZip => "embedding_result_zip",
        }
    }

    /// Name of the uploaded file.
    pub fn file_name(self) -> String {
        match self {
            UploadLabel::EmbeddingZip => BUNDLE_FILE_NAME.to_string(),
            image => format!("{}.bmp", image.as_str()),
        }
    }
}

impl fmt::Display for UploadLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The three images produced by one embedding run.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddingImages<'a> {
    pub watermarked_image: &'a GrayImage,
    pub key_image: &'a GrayImage,
    pub block_position: &'a GrayImage,
}

impl<'a> EmbeddingImages<'a> {
    pub fn new(
        watermarked_image: &'a GrayImage,
        key_image: &'a GrayImage,
        block_position: &'a GrayImage,
    ) -> Self {
        Self {
            watermarked_image,
            key_image,
            block_position,
        }
    }

    pub fn get(&self, label: UploadLabel) -> Option<&'a GrayImage> {
        match label {
            UploadLabel::WatermarkedImage => Some(self.watermarked_image),
            UploadLabel::KeyImage => Some(self.key_image),
            UploadLabel::BlockPosition => Some(self.block_position),
            UploadLabel::EmbeddingZip => None,
        }
    }

    /// Each image with its label, in upload order.
    pub fn labeled(&self) -> impl Iterator<Item = (UploadLabel, &'a GrayImage)> + '_ {
        UploadLabel::IMAGES
            .into_iter()
            .filter_map(move |label| self.get(label).map(|image| (label, image)))
    }

    /// Zip archive holding every image as a stored `{label}.bmp` member.
    pub fn to_zip(&self) -> Result<Vec<u8>> {
        let members = self
            .labeled()
            .map(|(label, image)| -> Result<(String, Vec<u8>)> {
                Ok((label.file_name(), encode_bmp(image)?))
            })
            .collect::<Result<Vec<_>>>()?;

        bundle_zip(
            members
                .iter()
                .map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
        )
    }
}

/// Outcome of [`DriveClient::upload_mixed_files`]: always exactly one
/// entry per [`UploadLabel`].
#[derive(Debug)]
pub struct MixedUploadReport {
    entries: BTreeMap<UploadLabel, Result<RemoteFile>>,
}

impl MixedUploadReport {
    pub fn get(&self, label: UploadLabel) -> Option<&Result<RemoteFile>> {
        self.entries.get(&label)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UploadLabel, &Result<RemoteFile>)> {
        self.entries.iter().map(|(label, result)| (*label, result))
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.values().all(|result| result.is_ok())
    }
}

impl DriveClient {
    /// Upload the three embedding images to `parent_id`, then a zip of all
    /// three, sharing each upload with `email` when given.
    ///
    /// Failures never abort the batch: each entry of the report records its
    /// own outcome. Staged temporary files are removed whether or not the
    /// upload succeeds.
    pub async fn upload_mixed_files(
        &self,
        parent_id: &str,
        images: &EmbeddingImages<'_>,
        email: Option<&str>,
    ) -> MixedUploadReport {
        let mut entries = BTreeMap::new();

        for (label, image) in images.labeled() {
            let result = self.upload_single_image(parent_id, label, image, email).await;
            entries.insert(label, tag_failure(label, result));
        }

        let zip_result = self.upload_bundle(parent_id, images, email).await;
        entries.insert(
            UploadLabel::EmbeddingZip,
            tag_failure(UploadLabel::EmbeddingZip, zip_result),
        );

        let report = MixedUploadReport { entries };
        if report.all_succeeded() {
            tracing::info!("Uploaded all files successfully");
        }
        report
    }

    async fn upload_single_image(
        &self,
        parent_id: &str,
        label: UploadLabel,
        image: &GrayImage,
        email: Option<&str>,
    ) -> Result<RemoteFile> {
        let bytes = encode_bmp(image)?;
        self.upload_staged(&bytes, ".bmp", &label.file_name(), parent_id, BMP_MIME_TYPE, email)
            .await
    }

    async fn upload_bundle(
        &self,
        parent_id: &str,
        images: &EmbeddingImages<'_>,
        email: Option<&str>,
    ) -> Result<RemoteFile> {
        let bytes = images.to_zip()?;
        self.upload_staged(&bytes, ".zip", BUNDLE_FILE_NAME, parent_id, ZIP_MIME_TYPE, email)
            .await
    }

    /// Stage `bytes`, upload them and share the result. The staged file is
    /// dropped (and deleted) on every return path.
    async fn upload_staged(
        &self,
        bytes: &[u8],
        suffix: &str,
        name: &str,
        parent_id: &str,
        mime_type: &str,
        email: Option<&str>,
    ) -> Result<RemoteFile> {
        let staged = stage_bytes(bytes, suffix, self.staging_dir())?;
        let uploaded = self
            .upload_file(staged.path(), name, parent_id, Some(mime_type))
            .await?;

        if let Some(email) = email {
            self.share_with_reader(&uploaded.id, email).await?;
        }

        tracing::info!(name, id = %uploaded.id, "File uploaded successfully");
        Ok(uploaded)
    }
}

fn tag_failure(label: UploadLabel, result: Result<RemoteFile>) -> Result<RemoteFile> {
    result.map_err(|e| {
        tracing::warn!(label = %label, error = %e, "upload failed");
        DriveError::upload(label.file_name(), e)
    })
}
