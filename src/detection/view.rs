//! JSON shapes returned to the frontend for detections.

use serde::Serialize;

use super::Defect;
use crate::catalog::DefectCatalog;
use crate::imaging::{image_data_url, NormBox};
use crate::store::DefectRecord;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoxView {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectView {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub defect_type: String,
    pub class_id: i64,
    pub confidence: f64,
    #[serde(rename = "box")]
    pub bbox: BoxView,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub thumbnail: Option<String>,
    pub description: String,
    pub recommendation: String,
}

impl DefectView {
    fn build(
        catalog: &DefectCatalog,
        id: i64,
        class_id: i64,
        defect_type: &str,
        bbox: NormBox,
        confidence: f64,
        thumbnail: Option<&[u8]>,
    ) -> Self {
        Self {
            id,
            kind: defect_type.to_string(),
            defect_type: defect_type.to_string(),
            class_id,
            confidence,
            bbox: BoxView {
                x: bbox.x_center,
                y: bbox.y_center,
                width: bbox.width,
                height: bbox.height,
            },
            x_center: bbox.x_center,
            y_center: bbox.y_center,
            width: bbox.width,
            height: bbox.height,
            thumbnail: thumbnail
                .filter(|b| !b.is_empty())
                .map(|b| image_data_url(b, "image/jpeg")),
            description: catalog.description(defect_type).to_string(),
            recommendation: catalog.recommendation(defect_type).to_string(),
        }
    }

    pub fn from_defect(catalog: &DefectCatalog, defect: &Defect) -> Self {
        Self::build(
            catalog,
            defect.id,
            defect.class_id,
            &defect.defect_type,
            defect.bbox,
            defect.confidence,
            defect.thumbnail.as_deref(),
        )
    }

    /// Stored defects are numbered by their position within the run.
    pub fn from_record(catalog: &DefectCatalog, position: usize, record: &DefectRecord) -> Self {
        Self::build(
            catalog,
            position as i64 + 1,
            record.class_id,
            &record.defect_type,
            NormBox {
                x_center: record.x_center,
                y_center: record.y_center,
                width: record.width,
                height: record.height,
            },
            record.confidence,
            record.thumbnail.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub total_defects: i64,
    pub average_confidence: f64,
    pub detection_time: i64,
}
