//! Wire types for the detection service.
//!
//! Parsing is loose: every field is optional, camelCase and
//! snake_case keys are both accepted, and numbers may arrive as strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn null_as_empty<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}

/// Top-level `/detect` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    #[serde(alias = "error")]
    pub detail: Option<Value>,
    pub data: Option<RawDetection>,
}

impl RawResponse {
    /// Best human-readable failure text the service gave us.
    pub fn failure_message(&self) -> Option<String> {
        self.message.clone().or_else(|| match &self.detail {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawDetection {
    #[serde(alias = "original_image")]
    pub original_image: Option<String>,
    #[serde(alias = "result_image")]
    pub result_image: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub defects: Vec<RawDefect>,
    pub summary: Option<RawSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawDefect {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: Option<i64>,
    #[serde(alias = "class_id", deserialize_with = "lenient_i64")]
    pub class_id: Option<i64>,
    #[serde(alias = "defect_type", alias = "type")]
    pub defect_type: Option<String>,
    #[serde(alias = "x_center", deserialize_with = "lenient_f64")]
    pub x_center: Option<f64>,
    #[serde(alias = "y_center", deserialize_with = "lenient_f64")]
    pub y_center: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub width: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub confidence: Option<f64>,
    pub thumbnail: Option<String>,
    #[serde(rename = "box", alias = "bbox")]
    pub bbox: Option<RawBox>,
}

/// Alternate box shape: center x/y plus size.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBox {
    #[serde(deserialize_with = "lenient_f64")]
    pub x: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub y: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub width: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSummary {
    #[serde(alias = "total_defects", deserialize_with = "lenient_i64")]
    pub total_defects: Option<i64>,
    #[serde(alias = "average_confidence", deserialize_with = "lenient_f64")]
    pub average_confidence: Option<f64>,
    #[serde(alias = "detection_time", deserialize_with = "lenient_f64")]
    pub detection_time: Option<f64>,
}

/// `/health` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(alias = "modelLoaded")]
    pub model_loaded: bool,
}
