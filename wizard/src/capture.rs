//! Camera captures decoded into in-memory files.
//!
//! Capture widgets hand the wizard a `data:image/...;base64,...` URL. This
//! module turns that into a [`CapturedFile`] that can be previewed and later
//! uploaded, rejecting anything that is not a reasonably sized image. Files
//! stay in memory until the final step succeeds; nothing is written to disk.

#[cfg(test)]
#[path = "capture_test.rs"]
mod capture_test;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::consts::MAX_CAPTURE_BYTES;

/// An image held in memory between capture and batch upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFile {
    /// Synthesized file name, e.g. `selfie.jpg`.
    pub name: String,
    /// MIME type, always `image/*` once validated.
    pub mime: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

/// Why a capture could not be converted.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The input was not a `data:` URL at all.
    #[error("capture is not a data URL")]
    NotDataUrl,
    /// Intermediate `blob:` object references cannot be decoded; the widget
    /// must be asked for a fresh capture instead.
    #[error("capture is an object reference; retake the photo")]
    ObjectUrl,
    /// The header between `data:` and the payload was malformed.
    #[error("malformed data URL header")]
    MalformedHeader,
    /// The base64 payload did not decode.
    #[error("invalid capture payload: {0}")]
    Decode(#[from] base64::DecodeError),
    /// The MIME type is not an image.
    #[error("capture must be an image, got `{0}`")]
    NotAnImage(String),
    /// The decoded image is over the upload limit.
    #[error("capture is {0} bytes, over the 5 MB limit")]
    TooLarge(usize),
}

/// Decode a capture widget's data URL into a file named after its field.
///
/// # Errors
///
/// Returns a [`CaptureError`] for `blob:` references, non-`data:` input,
/// malformed headers, undecodable payloads, non-image MIME types, and
/// oversized images.
pub fn decode_data_url(field: &str, url: &str) -> Result<CapturedFile, CaptureError> {
    if url.starts_with("blob:") {
        return Err(CaptureError::ObjectUrl);
    }
    let Some(rest) = url.strip_prefix("data:") else {
        return Err(CaptureError::NotDataUrl);
    };
    let Some((header, payload)) = rest.split_once(";base64,") else {
        return Err(CaptureError::MalformedHeader);
    };
    if header.is_empty() || header.contains(',') {
        return Err(CaptureError::MalformedHeader);
    }

    let bytes = STANDARD.decode(payload.trim())?;
    let file = CapturedFile {
        name: format!("{field}.{}", extension_for(header)),
        mime: header.to_owned(),
        bytes,
    };
    check(&file)?;
    Ok(file)
}

/// Validate a file the host already holds as raw bytes (e.g. read from disk).
///
/// # Errors
///
/// Returns [`CaptureError::NotAnImage`] or [`CaptureError::TooLarge`].
pub fn check(file: &CapturedFile) -> Result<(), CaptureError> {
    if !file.mime.starts_with("image/") {
        return Err(CaptureError::NotAnImage(file.mime.clone()));
    }
    if file.bytes.len() > MAX_CAPTURE_BYTES {
        return Err(CaptureError::TooLarge(file.bytes.len()));
    }
    Ok(())
}

/// Guess a MIME type from a file extension, for host-side file loads.
#[must_use]
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        other => other.rsplit('/').next().unwrap_or("bin"),
    }
}
