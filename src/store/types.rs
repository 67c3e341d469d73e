use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A user row without the avatar blob.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub avatar_mime: Option<String>,
    pub avatar_size: Option<i64>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct Avatar {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Values for a new detection run.
#[derive(Debug, Clone)]
pub struct NewDetection {
    pub user_id: i64,
    pub original_image: Vec<u8>,
    pub original_image_type: String,
    pub result_image: Option<Vec<u8>>,
    pub defect_count: i64,
    pub average_confidence: f64,
    pub detection_time: i64,
}

#[derive(Debug, Clone)]
pub struct NewDefect {
    pub defect_type: String,
    pub class_id: i64,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    pub thumbnail: Option<Vec<u8>>,
}

/// Detection run metadata, without image payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSummary {
    pub id: i64,
    pub user_id: i64,
    pub defect_count: i64,
    pub average_confidence: f64,
    pub detection_time: i64,
    pub created_at: String,
}

/// A detection run with its stored images.
#[derive(Debug, Clone)]
pub struct DetectionRecord {
    pub summary: DetectionSummary,
    pub original_image: Vec<u8>,
    pub original_image_type: String,
    pub result_image: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct DefectRecord {
    pub id: i64,
    pub detection_id: i64,
    pub defect_type: String,
    pub class_id: i64,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f64,
    pub thumbnail: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub id: i64,
    pub model_name: String,
    pub model_version: String,
    pub model_file: String,
    pub is_active: bool,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    DefectCount,
    AverageConfidence,
    DetectionTime,
}

impl SortField {
    /// Parse the API field name; anything else is rejected.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "createdAt" => Some(SortField::CreatedAt),
            "defectCount" => Some(SortField::DefectCount),
            "averageConfidence" => Some(SortField::AverageConfidence),
            "detectionTime" => Some(SortField::DetectionTime),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::DefectCount => "defect_count",
            SortField::AverageConfidence => "average_confidence",
            SortField::DetectionTime => "detection_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Text search over a user's history.
#[derive(Debug, Clone, PartialEq)]
pub enum HistorySearch {
    /// All digits: matches ids containing them.
    Id(String),
    /// Anything else: matches `YYYY-MM-DD` or `YYYY-MM-DD HH:MM` of created_at.
    Date(String),
}

/// Filters and paging for one history page. All filters are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub user_id: i64,
    pub search: Option<HistorySearch>,
    /// Lower bound on created_at, in stored timestamp format.
    pub since: Option<String>,
    pub defect_type: Option<String>,
    pub has_defects: Option<bool>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}
