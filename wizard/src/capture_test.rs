use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::*;

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

// =============================================================
// Decoding
// =============================================================

#[test]
fn decodes_a_jpeg_capture() {
    let url = data_url("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]);
    let file = decode_data_url("selfie", &url).unwrap();
    assert_eq!(file.name, "selfie.jpg");
    assert_eq!(file.mime, "image/jpeg");
    assert_eq!(file.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
}

#[test]
fn png_extension_follows_the_mime_type() {
    let url = data_url("image/png", &[1, 2, 3]);
    let file = decode_data_url("idFront", &url).unwrap();
    assert_eq!(file.name, "idFront.png");
}

#[test]
fn object_reference_urls_are_rejected() {
    let result = decode_data_url("selfie", "blob:https://app.example/9f81");
    assert!(matches!(result, Err(CaptureError::ObjectUrl)));
}

#[test]
fn non_data_input_is_rejected() {
    let result = decode_data_url("selfie", "https://example.com/a.jpg");
    assert!(matches!(result, Err(CaptureError::NotDataUrl)));
}

#[test]
fn missing_base64_marker_is_malformed() {
    let result = decode_data_url("selfie", "data:image/jpeg,AAAA");
    assert!(matches!(result, Err(CaptureError::MalformedHeader)));
}

#[test]
fn garbage_payload_fails_to_decode() {
    let result = decode_data_url("selfie", "data:image/jpeg;base64,@@not-base64@@");
    assert!(matches!(result, Err(CaptureError::Decode(_))));
}

#[test]
fn non_image_mime_is_rejected() {
    let url = data_url("application/pdf", &[1, 2, 3]);
    let result = decode_data_url("selfie", &url);
    assert!(matches!(result, Err(CaptureError::NotAnImage(_))));
}

#[test]
fn oversized_capture_is_rejected() {
    let url = data_url("image/jpeg", &vec![0; crate::consts::MAX_CAPTURE_BYTES + 1]);
    let result = decode_data_url("selfie", &url);
    assert!(matches!(result, Err(CaptureError::TooLarge(_))));
}

// =============================================================
// Host-side file loads
// =============================================================

#[test]
fn check_accepts_a_small_image() {
    let file = CapturedFile {
        name: "selfie.jpg".to_owned(),
        mime: "image/jpeg".to_owned(),
        bytes: vec![0; 1024],
    };
    assert!(check(&file).is_ok());
}

#[test]
fn mime_guessing_covers_common_extensions() {
    assert_eq!(mime_for_extension("jpg"), Some("image/jpeg"));
    assert_eq!(mime_for_extension("JPEG"), Some("image/jpeg"));
    assert_eq!(mime_for_extension("png"), Some("image/png"));
    assert_eq!(mime_for_extension("pdf"), None);
}
