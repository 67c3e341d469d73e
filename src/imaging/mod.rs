//! Image helpers for detection artifacts: data URLs, defect thumbnails and
//! locally drawn annotations.

pub mod annotate;
pub mod data_url;
pub mod thumbnail;

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use thiserror::Error;

pub use annotate::annotate_defects;
pub use data_url::{decode_image, image_data_url, sniff_mime, to_data_url, DecodedImage};
pub use thumbnail::crop_thumbnail;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Empty crop region")]
    EmptyRegion,
}

/// Bounding box in normalized (0..1) center format, as the detector reports it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormBox {
    /// Pixel corners `[x0, y0, x1, y1]` clamped to the image, or None when the
    /// box lies entirely outside it.
    pub fn to_pixels(&self, dims: (u32, u32)) -> Option<[u32; 4]> {
        let (w, h) = dims;
        if w == 0 || h == 0 {
            return None;
        }
        let clamp = |v: f64, max: u32| -> u32 { v.max(0.0).min((max - 1) as f64) as u32 };
        let x0 = clamp((self.x_center - self.width / 2.0) * w as f64, w);
        let y0 = clamp((self.y_center - self.height / 2.0) * h as f64, h);
        let x1 = clamp((self.x_center + self.width / 2.0) * w as f64, w);
        let y1 = clamp((self.y_center + self.height / 2.0) * h as f64, h);
        if x0 > x1 || y0 > y1 {
            return None;
        }
        Some([x0, y0, x1, y1])
    }
}

pub fn load(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))
}

/// Encode to JPEG at the given quality (1-100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode_image(&img.to_rgb8())
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_box_to_pixels() {
        let b = NormBox { x_center: 0.5, y_center: 0.5, width: 0.25, height: 0.5 };
        assert_eq!(b.to_pixels((100, 100)), Some([37, 25, 62, 75]));
    }

    #[test]
    fn test_norm_box_clamps_to_image() {
        let b = NormBox { x_center: 0.875, y_center: 0.125, width: 0.5, height: 0.5 };
        assert_eq!(b.to_pixels((100, 100)), Some([62, 0, 99, 37]));
        assert_eq!(b.to_pixels((0, 100)), None);
    }

    #[test]
    fn test_encode_jpeg_magic_bytes() {
        let img = DynamicImage::new_rgb8(32, 16);
        let bytes = encode_jpeg(&img, 90).unwrap();
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[1], 0xD8);
    }
}
