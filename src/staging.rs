//! Local staging of upload payloads: BMP encoding, zip bundling, and
//! temporary files that remove themselves when dropped.

use std::io::{Cursor, Write};
use std::path::Path;

use image::{GrayImage, ImageFormat};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

const STAGING_PREFIX: &str = "drive_embed_";

/// Encode a grayscale image as an 8-bit BMP. Lossless, and deterministic
/// for a given image.
pub fn encode_bmp(image: &GrayImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Bmp)?;
    Ok(buf.into_inner())
}

/// Pack `(name, bytes)` entries into a zip with stored (uncompressed) members.
pub fn bundle_zip<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, bytes) in entries {
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Write `bytes` to a uniquely named temporary file ending in `suffix`.
///
/// The file lives in `dir` when given, otherwise in the system temporary
/// directory, and is deleted when the returned handle is dropped.
pub fn stage_bytes(bytes: &[u8], suffix: &str, dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX).suffix(suffix);

    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    file.write_all(bytes)?;
    file.flush()?;

    tracing::debug!(path = %file.path().display(), bytes = bytes.len(), "staged upload");
    Ok(file)
}
