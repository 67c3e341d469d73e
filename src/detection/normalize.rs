use std::cell::OnceCell;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::catalog::DefectCatalog;
use crate::imaging::{self, annotate_defects, crop_thumbnail, decode_image, NormBox};
use crate::inference::{RawDefect, RawDetection};
use crate::store::{NewDefect, NewDetection};

/// One defect that survived normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Defect {
    /// 1-based position in the result.
    pub id: i64,
    pub class_id: i64,
    pub defect_type: String,
    pub bbox: NormBox,
    pub confidence: f64,
    pub thumbnail: Option<Vec<u8>>,
}

/// A normalized detection run, ready to persist and render.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub result_image: Vec<u8>,
    pub result_mime: String,
    pub defects: Vec<Defect>,
    pub total_defects: i64,
    pub average_confidence: f64,
    /// Milliseconds.
    pub detection_time: i64,
}

impl DetectionOutcome {
    /// Rows to store for `user_id`.
    pub fn to_records(
        &self,
        user_id: i64,
        original: &[u8],
        original_mime: &str,
    ) -> (NewDetection, Vec<NewDefect>) {
        let detection = NewDetection {
            user_id,
            original_image: original.to_vec(),
            original_image_type: original_mime.to_string(),
            result_image: Some(self.result_image.clone()),
            defect_count: self.total_defects,
            average_confidence: self.average_confidence,
            detection_time: self.detection_time,
        };
        let defects = self
            .defects
            .iter()
            .map(|d| NewDefect {
                defect_type: d.defect_type.clone(),
                class_id: d.class_id,
                x_center: d.bbox.x_center,
                y_center: d.bbox.y_center,
                width: d.bbox.width,
                height: d.bbox.height,
                confidence: d.confidence,
                thumbnail: d.thumbnail.clone(),
            })
            .collect();
        (detection, defects)
    }
}

/// Finite value clamped to 0..1; anything else becomes 0.
fn unit(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

fn defect_box(raw: &RawDefect) -> NormBox {
    let alt = raw.bbox.clone().unwrap_or_default();
    NormBox {
        x_center: unit(raw.x_center.or(alt.x)),
        y_center: unit(raw.y_center.or(alt.y)),
        width: unit(raw.width.or(alt.width)),
        height: unit(raw.height.or(alt.height)),
    }
}

/// Normalize the service's answer for an uploaded image.
///
/// Image work (decoding, annotation, thumbnails) is CPU-bound; call this from
/// the blocking pool.
pub fn normalize(
    catalog: &DefectCatalog,
    original: &[u8],
    original_mime: &str,
    threshold: f64,
    raw: RawDetection,
    elapsed_ms: i64,
) -> DetectionOutcome {
    let decoded: OnceCell<Option<DynamicImage>> = OnceCell::new();
    let decoded = &decoded;
    let source = move || {
        decoded
            .get_or_init(|| match imaging::load(original) {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!("Uploaded image could not be decoded: {}", e);
                    None
                }
            })
            .as_ref()
    };

    let mut defects = Vec::with_capacity(raw.defects.len());
    for item in &raw.defects {
        let confidence = unit(item.confidence);
        if confidence < threshold {
            continue;
        }
        let class_id = item.class_id.unwrap_or(0);
        let defect_type = item
            .defect_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| catalog.key_for(class_id))
            .to_string();
        let bbox = defect_box(item);

        let thumbnail = match item.thumbnail.as_deref().and_then(decode_image) {
            Some(provided) => Some(provided.bytes),
            None => source().and_then(|img| match crop_thumbnail(img, &bbox) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    debug!("No thumbnail for {} defect: {}", defect_type, e);
                    None
                }
            }),
        };

        defects.push(Defect {
            id: defects.len() as i64 + 1,
            class_id,
            defect_type,
            bbox,
            confidence,
            thumbnail,
        });
    }

    let (result_image, result_mime) = match raw.result_image.as_deref().and_then(decode_image) {
        Some(provided) => (provided.bytes, provided.mime.to_string()),
        None => {
            let boxes: Vec<(NormBox, [u8; 3])> = defects
                .iter()
                .map(|d| (d.bbox, catalog.color(&d.defect_type)))
                .collect();
            match source().map(|img| annotate_defects(img, &boxes)) {
                Some(Ok(bytes)) => (bytes, "image/jpeg".to_string()),
                Some(Err(e)) => {
                    warn!("Local annotation failed, returning the original: {}", e);
                    (original.to_vec(), original_mime.to_string())
                }
                None => (original.to_vec(), original_mime.to_string()),
            }
        }
    };

    let total_defects = defects.len() as i64;
    let average_confidence = if defects.is_empty() {
        0.0
    } else {
        defects.iter().map(|d| d.confidence).sum::<f64>() / defects.len() as f64
    };
    let detection_time = raw
        .summary
        .as_ref()
        .and_then(|s| s.detection_time)
        .filter(|t| t.is_finite() && *t > 0.0)
        .map(|t| t.round() as i64)
        .unwrap_or(elapsed_ms);

    DetectionOutcome {
        result_image,
        result_mime,
        defects,
        total_defects,
        average_confidence,
        detection_time,
    }
}
