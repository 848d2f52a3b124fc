//! Accept Drive resources either as share URLs or as bare ids.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DriveError, Result};

/// Folder, file and legacy `open?id=` share URLs.
static SHARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://drive\.google\.com/(?:drive/(?:u/\d+/)?folders/|file/d/|open\?id=)([A-Za-z0-9_-]+)",
    )
    .expect("share URL regex")
});

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("bare id regex"));

/// Resolve `input` to a Drive id.
///
/// ```
/// use drive_embed::resource_id::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/u/0/folders/1HIeIAyf").unwrap();
/// assert_eq!(id, "1HIeIAyf");
/// assert_eq!(extract_id("1HIeIAyf").unwrap(), "1HIeIAyf");
/// ```
pub fn extract_id(input: &str) -> Result<String> {
    let trimmed = input.trim();

    if let Some(id) = SHARE_URL.captures(trimmed).and_then(|c| c.get(1)) {
        return Ok(id.as_str().to_string());
    }
    if BARE_ID.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(DriveError::InvalidUrlOrId(input.to_string()))
}
