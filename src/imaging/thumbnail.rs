//! Per-defect thumbnail crops.

use image::{imageops::FilterType, DynamicImage};

use super::{encode_jpeg, ImageError, NormBox};

/// Thumbnails fit inside a square of this size.
pub const THUMBNAIL_SIZE: u32 = 200;
pub const THUMBNAIL_QUALITY: u8 = 80;

/// Context kept on each side of the box center, as a multiple of box size.
const CONTEXT_FACTOR: f64 = 0.7;

/// Crop region `(left, top, width, height)` in pixels for a defect box.
///
/// The region starts `0.7 * box` before the center and spans `1.4 * box`,
/// clamped to the image and never smaller than one pixel.
pub fn crop_region(bbox: &NormBox, dims: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = dims;
    if w == 0 || h == 0 {
        return None;
    }
    let box_w = bbox.width * w as f64;
    let box_h = bbox.height * h as f64;

    let left = (bbox.x_center * w as f64 - box_w * CONTEXT_FACTOR).round().max(0.0) as u32;
    let top = (bbox.y_center * h as f64 - box_h * CONTEXT_FACTOR).round().max(0.0) as u32;
    let left = left.min(w - 1);
    let top = top.min(h - 1);

    let crop_w = ((box_w * CONTEXT_FACTOR * 2.0).round() as u32).clamp(1, w - left);
    let crop_h = ((box_h * CONTEXT_FACTOR * 2.0).round() as u32).clamp(1, h - top);

    Some((left, top, crop_w, crop_h))
}

/// Crop the defect neighbourhood, fit it inside 200x200 and encode as JPEG.
pub fn crop_thumbnail(img: &DynamicImage, bbox: &NormBox) -> Result<Vec<u8>, ImageError> {
    let (left, top, width, height) =
        crop_region(bbox, (img.width(), img.height())).ok_or(ImageError::EmptyRegion)?;

    let cropped = img.crop_imm(left, top, width, height);
    let fitted = cropped.resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);
    encode_jpeg(&fitted, THUMBNAIL_QUALITY)
}
