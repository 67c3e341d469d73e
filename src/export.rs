//! Zip archives of detection results in the YOLO label layout.
//!
//! Label lines are `class_id x_center y_center width height confidence`
//! with normalized coordinates, one defect per line.

use std::{
    collections::HashSet,
    io::{Cursor, Write},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zip::{result::ZipResult, write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::history::RecordResult;
use crate::imaging::data_url::decode_bytes;
use crate::store::{DefectRecord, DetectionRecord};

const EXPORTED: &str = "Exported";
pub(crate) const NOT_ACCESSIBLE: &str = "Detection record not found or not accessible";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRow {
    pub class_id: i64,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
}

impl From<&DefectRecord> for LabelRow {
    fn from(d: &DefectRecord) -> Self {
        Self {
            class_id: d.class_id,
            x_center: d.x_center,
            y_center: d.y_center,
            width: d.width,
            height: d.height,
            confidence: d.confidence,
        }
    }
}

pub fn label_text(rows: &[LabelRow]) -> String {
    rows.iter()
        .map(|r| {
            format!(
                "{} {} {} {} {} {}",
                r.class_id, r.x_center, r.y_center, r.width, r.height, r.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Box as the frontend echoes it back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientBox {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// A defect as the frontend echoes it back. Zero and missing values fall
/// back to the `box` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientDefect {
    pub class_id: Option<i64>,
    pub x_center: Option<f64>,
    pub y_center: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(rename = "box")]
    pub bbox: Option<ClientBox>,
}

impl ClientDefect {
    pub fn label(&self) -> LabelRow {
        let bbox = self.bbox.clone().unwrap_or_default();
        let pick = |primary: Option<f64>, fallback: Option<f64>| {
            primary
                .filter(|v| *v != 0.0)
                .or(fallback)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };
        LabelRow {
            class_id: self.class_id.unwrap_or(0),
            x_center: pick(self.x_center, bbox.x),
            y_center: pick(self.y_center, bbox.y),
            width: pick(self.width, bbox.width),
            height: pick(self.height, bbox.height),
            confidence: self.confidence.filter(|v| v.is_finite()).unwrap_or(0.0),
        }
    }
}

/// Detection results posted back by the client for export.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientResults {
    pub result_image: Option<String>,
    pub defects: Vec<ClientDefect>,
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// `results/predict/output.jpg` plus `results/predict/labels/input.txt`.
pub fn result_archive(result_image: Option<&[u8]>, labels: &[LabelRow]) -> ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    if let Some(image) = result_image {
        zip.start_file("results/predict/output.jpg", options())?;
        zip.write_all(image)?;
    }
    zip.start_file("results/predict/labels/input.txt", options())?;
    zip.write_all(label_text(labels).as_bytes())?;

    Ok(zip.finish()?.into_inner())
}

pub fn client_archive(results: &ClientResults) -> ZipResult<Vec<u8>> {
    let image = results.result_image.as_deref().and_then(decode_bytes);
    let labels: Vec<LabelRow> = results.defects.iter().map(ClientDefect::label).collect();
    result_archive(image.as_deref(), &labels)
}

pub fn stored_archive(record: &DetectionRecord, defects: &[DefectRecord]) -> ZipResult<Vec<u8>> {
    let labels: Vec<LabelRow> = defects.iter().map(LabelRow::from).collect();
    result_archive(record.result_image.as_deref(), &labels)
}

/// `detection_result_{id}_{YYYY-MM-DDTHH-MM-SS}.zip`
pub fn stored_file_name(id: i64, created_at: &str) -> String {
    let stamp: String = created_at.chars().take(19).collect::<String>().replace(':', "-");
    format!("detection_result_{}_{}.zip", id, stamp)
}

pub fn client_file_name(now: DateTime<Utc>) -> String {
    format!("detection_result_{}.zip", now.timestamp_millis())
}

pub fn batch_file_name(now: DateTime<Utc>) -> String {
    format!("batch_detection_results_{}.zip", now.timestamp_millis())
}

/// One requested id of a batch export, found or not.
#[derive(Debug, Clone)]
pub enum BatchRecord {
    Found {
        record: DetectionRecord,
        defects: Vec<DefectRecord>,
        defect_types: Vec<String>,
    },
    Missing(i64),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectionInfo<'a> {
    id: i64,
    detection_time: i64,
    defect_count: i64,
    average_confidence: f64,
    created_at: &'a str,
    defect_types: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub export_time: String,
    pub total_records: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub results: Vec<RecordResult>,
}

/// A folder per record plus `export_summary.json` at the root.
/// A record listed twice is written once.
pub fn batch_archive(records: &[BatchRecord], export_time: &str) -> ZipResult<(Vec<u8>, BatchSummary)> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut results = Vec::with_capacity(records.len());
    let mut written = HashSet::new();

    for entry in records {
        let (record, defects, defect_types) = match entry {
            BatchRecord::Found { record, defects, defect_types } => (record, defects, defect_types),
            BatchRecord::Missing(id) => {
                results.push(RecordResult::failed(*id, NOT_ACCESSIBLE));
                continue;
            }
        };
        let summary = &record.summary;
        if !written.insert(summary.id) {
            continue;
        }
        let dir = format!("detection_{}", summary.id);

        let info = DetectionInfo {
            id: summary.id,
            detection_time: summary.detection_time,
            defect_count: summary.defect_count,
            average_confidence: summary.average_confidence,
            created_at: &summary.created_at,
            defect_types,
        };
        let info_json = serde_json::to_string_pretty(&info).map_err(std::io::Error::other)?;
        zip.start_file(format!("{dir}/detection_info.json"), options())?;
        zip.write_all(info_json.as_bytes())?;

        zip.start_file(format!("{dir}/original_image.jpg"), options())?;
        zip.write_all(&record.original_image)?;

        if let Some(result) = &record.result_image {
            zip.start_file(format!("{dir}/results/predict/result_image.jpg"), options())?;
            zip.write_all(result)?;
        }

        let labels: Vec<LabelRow> = defects.iter().map(LabelRow::from).collect();
        zip.start_file(format!("{dir}/results/predict/labels/labels.txt"), options())?;
        zip.write_all(label_text(&labels).as_bytes())?;

        results.push(RecordResult::ok(summary.id, EXPORTED));
    }

    let success_count = results.iter().filter(|r| r.success).count();
    let summary = BatchSummary {
        export_time: export_time.to_string(),
        total_records: results.len(),
        success_count,
        fail_count: results.len() - success_count,
        results,
    };
    let summary_json = serde_json::to_string_pretty(&summary).map_err(std::io::Error::other)?;
    zip.start_file("export_summary.json", options())?;
    zip.write_all(summary_json.as_bytes())?;

    Ok((zip.finish()?.into_inner(), summary))
}
