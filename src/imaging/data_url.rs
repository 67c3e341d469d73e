//! `data:` URL parsing and construction.
//!
//! The inference service is inconsistent about prefixes: result images and
//! thumbnails arrive either as `data:image/<fmt>;base64,<payload>` or as bare
//! base64, and a missing image may be serialized as the string `None`.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;

static DATA_URL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)?(;[^,]*)?;base64,")
        .expect("data URL pattern must compile")
});

/// Image bytes recovered from a data URL or bare base64 payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// MIME sniffed from the bytes, not the declared prefix.
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Split off a `data:...;base64,` prefix, returning the declared MIME and payload.
pub fn strip_prefix(input: &str) -> (Option<&str>, &str) {
    let trimmed = input.trim();
    match DATA_URL_PREFIX.captures(trimmed) {
        Some(caps) => {
            let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
            (caps.get(1).map(|m| m.as_str()), &trimmed[end..])
        }
        None => (None, trimmed),
    }
}

/// Base64-decode a payload, with or without a data URL prefix.
pub fn decode_bytes(input: &str) -> Option<Vec<u8>> {
    let (_, payload) = strip_prefix(input);
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    STANDARD.decode(compact.as_bytes()).ok().filter(|b| !b.is_empty())
}

/// Decode a payload and accept it only if the bytes are a recognizable image.
pub fn decode_image(input: &str) -> Option<DecodedImage> {
    let bytes = decode_bytes(input)?;
    let mime = sniff_mime(&bytes)?;
    Some(DecodedImage { mime, bytes })
}

pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Data URL typed by the bytes themselves, or `fallback` when unrecognized.
pub fn image_data_url(bytes: &[u8], fallback: &str) -> String {
    to_data_url(sniff_mime(bytes).unwrap_or(fallback), bytes)
}
