//! Local fallback for the annotated result image, used when the inference
//! service returns no usable drawing of its own.

use image::{DynamicImage, Rgba, RgbaImage};

use super::{encode_jpeg, ImageError, NormBox};

pub const ANNOTATION_QUALITY: u8 = 90;
const BOX_THICKNESS: u32 = 3;

/// Draw a rectangle border with the given thickness, growing inward.
pub fn draw_rect(img: &mut RgbaImage, bbox_px: [u32; 4], color: Rgba<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let [x0, y0, x1, y1] = bbox_px;
    for t in 0..thickness {
        let xx0 = x0.saturating_add(t);
        let yy0 = y0.saturating_add(t);
        let xx1 = x1.saturating_sub(t);
        let yy1 = y1.saturating_sub(t);
        if xx0 >= w || yy0 >= h || xx1 >= w || yy1 >= h || xx0 > xx1 || yy0 > yy1 {
            continue;
        }
        for x in xx0..=xx1 {
            img.put_pixel(x, yy0, color);
            img.put_pixel(x, yy1, color);
        }
        for y in yy0..=yy1 {
            img.put_pixel(xx0, y, color);
            img.put_pixel(xx1, y, color);
        }
    }
}

/// Outline every box in its class color and encode the result as JPEG.
pub fn annotate_defects(
    img: &DynamicImage,
    boxes: &[(NormBox, [u8; 3])],
) -> Result<Vec<u8>, ImageError> {
    let mut canvas = img.to_rgba8();
    let dims = canvas.dimensions();
    for (bbox, [r, g, b]) in boxes {
        if let Some(px) = bbox.to_pixels(dims) {
            draw_rect(&mut canvas, px, Rgba([*r, *g, *b, 255]), BOX_THICKNESS);
        }
    }
    encode_jpeg(&DynamicImage::ImageRgba8(canvas), ANNOTATION_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_rect_border_only() {
        let mut img = RgbaImage::new(20, 20);
        let red = Rgba([255, 0, 0, 255]);
        draw_rect(&mut img, [2, 2, 17, 17], red, 1);

        assert_eq!(*img.get_pixel(2, 2), red);
        assert_eq!(*img.get_pixel(17, 10), red);
        assert_eq!(*img.get_pixel(10, 10), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_rect_thickness_grows_inward() {
        let mut img = RgbaImage::new(20, 20);
        let blue = Rgba([0, 0, 255, 255]);
        draw_rect(&mut img, [0, 0, 19, 19], blue, 3);

        assert_eq!(*img.get_pixel(2, 10), blue);
        assert_eq!(*img.get_pixel(3, 10), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_annotate_keeps_dimensions() {
        let img = DynamicImage::new_rgb8(120, 80);
        let boxes = vec![(
            NormBox { x_center: 0.5, y_center: 0.5, width: 0.5, height: 0.5 },
            [255, 0, 0],
        )];
        let jpeg = annotate_defects(&img, &boxes).unwrap();
        let out = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((out.width(), out.height()), (120, 80));
    }
}
