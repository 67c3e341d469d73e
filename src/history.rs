//! History listing: query-string parsing, time windows and list items.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{
    timestamp, DetectionSummary, HistoryQuery, HistorySearch, SortField, SortOrder,
};

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Raw query string of `GET /api/detection/history`. Values stay strings so
/// junk falls back to defaults instead of failing extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub date_range: Option<String>,
    pub defect_type: Option<String>,
    pub has_defects: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Filters echoed back to the client; unset ones are null.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub search: Option<String>,
    pub date_range: Option<String>,
    pub defect_type: Option<String>,
    pub has_defects: Option<String>,
}

impl AppliedFilters {
    pub fn any(&self) -> bool {
        self.search.is_some()
            || self.date_range.is_some()
            || self.defect_type.is_some()
            || self.has_defects.is_some()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Positive integer from a query value, else `default`.
pub fn positive_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(default)
}

impl HistoryParams {
    pub fn page(&self) -> i64 {
        positive_or(self.page.as_deref(), 1)
    }

    pub fn limit(&self) -> i64 {
        positive_or(self.limit.as_deref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    pub fn applied_filters(&self) -> AppliedFilters {
        AppliedFilters {
            search: non_blank(&self.search),
            date_range: non_blank(&self.date_range),
            defect_type: non_blank(&self.defect_type),
            has_defects: non_blank(&self.has_defects),
        }
    }

    /// Sort field and order; an invalid pair falls back to created_at desc.
    fn sorting(&self) -> (SortField, SortOrder) {
        let field = SortField::parse(self.sort_by.as_deref().unwrap_or("createdAt"));
        let order = SortOrder::parse(self.sort_order.as_deref().unwrap_or("desc"));
        match (field, order) {
            (Some(field), Some(order)) => (field, order),
            _ => (SortField::default(), SortOrder::default()),
        }
    }

    pub fn to_query(&self, user_id: i64, now: DateTime<Utc>) -> HistoryQuery {
        let filters = self.applied_filters();
        let (sort, order) = self.sorting();
        let limit = self.limit();

        let search = filters.search.map(|term| {
            if term.chars().all(|c| c.is_ascii_digit()) {
                HistorySearch::Id(term)
            } else {
                HistorySearch::Date(term)
            }
        });

        HistoryQuery {
            user_id,
            search,
            since: filters
                .date_range
                .as_deref()
                .and_then(|range| range_start(range, now))
                .map(timestamp),
            defect_type: filters.defect_type,
            has_defects: match filters.has_defects.as_deref() {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            },
            sort,
            order,
            limit,
            offset: (self.page() - 1).saturating_mul(limit),
        }
    }
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    utc_midnight(now.date_naive())
}

pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    utc_midnight(now.date_naive().with_day(1).unwrap_or(now.date_naive()))
}

/// Start of a named window: today, week (last 7 days), month, quarter, year.
pub fn range_start(range: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    match range {
        "today" => Some(day_start(now)),
        "week" => Some(now - Duration::days(7)),
        "month" => Some(month_start(now)),
        "quarter" => {
            let first_month = (today.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(today.year(), first_month, 1).map(utc_midnight)
        }
        "year" => NaiveDate::from_ymd_opt(today.year(), 1, 1).map(utc_midnight),
        _ => None,
    }
}

pub fn confidence_level(average_confidence: f64) -> &'static str {
    if average_confidence >= 0.8 {
        "high"
    } else if average_confidence >= 0.6 {
        "medium"
    } else {
        "low"
    }
}

pub fn quality_status(defect_count: i64) -> &'static str {
    if defect_count == 0 {
        "good"
    } else {
        "defective"
    }
}

/// Round to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Fraction 0..1 as a percent with one decimal.
pub fn percent(fraction: f64) -> f64 {
    round_to(fraction * 100.0, 1)
}

pub fn page_count(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        0
    } else {
        (total + limit - 1) / limit
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            page,
            limit,
            pages: page_count(total, limit),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: i64,
    pub defect_count: i64,
    pub average_confidence: f64,
    pub detection_time: i64,
    pub created_at: String,
    pub defect_types: Vec<String>,
    pub has_defects: bool,
    pub quality_status: &'static str,
    pub confidence_level: &'static str,
}

impl HistoryItem {
    pub fn new(summary: DetectionSummary, defect_types: Vec<String>) -> Self {
        Self {
            id: summary.id,
            defect_count: summary.defect_count,
            average_confidence: summary.average_confidence,
            detection_time: summary.detection_time,
            has_defects: summary.defect_count > 0,
            quality_status: quality_status(summary.defect_count),
            confidence_level: confidence_level(summary.average_confidence),
            created_at: summary.created_at,
            defect_types,
        }
    }
}

/// Per-record outcome of a batch delete or export.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordResult {
    pub detection_id: i64,
    pub success: bool,
    pub message: String,
}

impl RecordResult {
    pub fn ok(detection_id: i64, message: &str) -> Self {
        Self { detection_id, success: true, message: message.to_string() }
    }

    pub fn failed(detection_id: i64, message: &str) -> Self {
        Self { detection_id, success: false, message: message.to_string() }
    }
}

/// Coarse relative time, e.g. "5 minutes ago".
pub fn time_ago(created_at: &str, now: DateTime<Utc>) -> String {
    let Ok(then) = DateTime::parse_from_rfc3339(created_at) else {
        return String::new();
    };
    let minutes = (now - then.with_timezone(&Utc)).num_minutes().max(0);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    };

    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = hours / 24;
    if days < 7 {
        return plural(days, "day");
    }
    let weeks = days / 7;
    if weeks < 4 {
        return plural(weeks, "week");
    }
    plural((days / 30).max(1), "month")
}

/// Display id such as `PCB-000042`.
pub fn display_id(id: i64) -> String {
    format!("PCB-{:06}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> HistoryParams {
        let mut p = HistoryParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "page" => p.page = v,
                "limit" => p.limit = v,
                "search" => p.search = v,
                "dateRange" => p.date_range = v,
                "defectType" => p.defect_type = v,
                "hasDefects" => p.has_defects = v,
                "sortBy" => p.sort_by = v,
                "sortOrder" => p.sort_order = v,
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn test_paging_defaults_and_clamps() {
        let p = params(&[]);
        assert_eq!((p.page(), p.limit()), (1, 12));
        let p = params(&[("page", "x"), ("limit", "0")]);
        assert_eq!((p.page(), p.limit()), (1, 12));
        let p = params(&[("page", "3"), ("limit", "500")]);
        assert_eq!((p.page(), p.limit()), (3, 100));
        assert_eq!(p.to_query(1, Utc::now()).offset, 200);
    }

    #[test]
    fn test_search_classification() {
        let now = at(2025, 5, 10, 12);
        let q = params(&[("search", " 42 ")]).to_query(9, now);
        assert_eq!(q.search, Some(HistorySearch::Id("42".into())));
        let q = params(&[("search", "2025-05")]).to_query(9, now);
        assert_eq!(q.search, Some(HistorySearch::Date("2025-05".into())));
        let q = params(&[("search", "   ")]).to_query(9, now);
        assert_eq!(q.search, None);
    }

    #[test]
    fn test_sorting_fallback() {
        let now = Utc::now();
        let q = params(&[("sortBy", "defectCount"), ("sortOrder", "ASC")]).to_query(1, now);
        assert_eq!((q.sort, q.order), (SortField::DefectCount, SortOrder::Asc));
        let q = params(&[("sortBy", "id; DROP TABLE"), ("sortOrder", "asc")]).to_query(1, now);
        assert_eq!((q.sort, q.order), (SortField::CreatedAt, SortOrder::Desc));
    }

    #[test]
    fn test_range_starts() {
        let now = at(2025, 8, 14, 15);
        assert_eq!(range_start("today", now), Some(Utc.with_ymd_and_hms(2025, 8, 14, 0, 0, 0).unwrap()));
        assert_eq!(range_start("week", now), Some(now - Duration::days(7)));
        assert_eq!(range_start("month", now), Some(Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()));
        assert_eq!(range_start("quarter", now), Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()));
        assert_eq!(range_start("year", now), Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(range_start("decade", now), None);
    }

    #[test]
    fn test_filters_into_query() {
        let now = at(2025, 8, 14, 15);
        let p = params(&[("dateRange", "month"), ("hasDefects", "false"), ("defectType", "short")]);
        let q = p.to_query(3, now);
        assert_eq!(q.since.as_deref(), Some("2025-08-01T00:00:00.000Z"));
        assert_eq!(q.has_defects, Some(false));
        assert_eq!(q.defect_type.as_deref(), Some("short"));
        assert!(p.applied_filters().any());
        assert!(!params(&[("hasDefects", "")]).applied_filters().any());
    }

    #[test]
    fn test_item_labels() {
        assert_eq!(confidence_level(0.8), "high");
        assert_eq!(confidence_level(0.6), "medium");
        assert_eq!(confidence_level(0.59), "low");
        assert_eq!(quality_status(0), "good");
        assert_eq!(quality_status(2), "defective");
        assert_eq!(display_id(42), "PCB-000042");
        assert_eq!(page_count(25, 12), 3);
        assert_eq!(page_count(0, 12), 0);
        assert_eq!(percent(0.87654), 87.7);
    }

    #[test]
    fn test_time_ago() {
        let now = at(2025, 8, 14, 15);
        let ts = |d: DateTime<Utc>| timestamp(d);
        assert_eq!(time_ago(&ts(now), now), "just now");
        assert_eq!(time_ago(&ts(now - Duration::minutes(1)), now), "1 minute ago");
        assert_eq!(time_ago(&ts(now - Duration::hours(5)), now), "5 hours ago");
        assert_eq!(time_ago(&ts(now - Duration::days(3)), now), "3 days ago");
        assert_eq!(time_ago(&ts(now - Duration::days(15)), now), "2 weeks ago");
        assert_eq!(time_ago(&ts(now - Duration::days(65)), now), "2 months ago");
        assert_eq!(time_ago("garbage", now), "");
    }
}
