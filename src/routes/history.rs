//! Stored detection history: listing, recent runs and deletion.

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::detection::record_id;
use super::extract::{AppJson, AppQuery};
use crate::auth::{AuthUser, MaybeUser};
use crate::error::{AppError, Result};
use crate::export::NOT_ACCESSIBLE;
use crate::history::{
    confidence_level, display_id, percent, positive_or, quality_status, time_ago, HistoryItem,
    HistoryParams, Pagination, RecordResult, MAX_PAGE_SIZE,
};
use crate::state::AppState;
use crate::store::detections;

const DEFAULT_RECENT_LIMIT: i64 = 5;

/// Ids from a JSON list. Numbers and numeric strings are accepted; repeats
/// keep their first position only.
pub(crate) fn detection_ids(raw: Option<Vec<Value>>, missing: &str) -> Result<Vec<i64>> {
    let raw = raw
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| AppError::BadRequest(missing.to_string()))?;
    let mut seen = HashSet::with_capacity(raw.len());
    let mut ids = Vec::with_capacity(raw.len());
    for value in &raw {
        let id = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| AppError::BadRequest(format!("Invalid detection id: {}", value)))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppQuery(params): AppQuery<HistoryParams>,
) -> Result<Json<Value>> {
    let query = params.to_query(user.id, Utc::now());
    let (total, history) = state
        .store
        .call(move |conn| {
            let (total, page) = detections::query_history(conn, &query)?;
            let items = page
                .into_iter()
                .map(|summary| -> Result<HistoryItem> {
                    let types = detections::defect_types_for(conn, summary.id)?;
                    Ok(HistoryItem::new(summary, types))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((total, items))
        })
        .await?;

    let filters = params.applied_filters();
    Ok(Json(json!({
        "success": true,
        "data": {
            "pagination": Pagination::new(total, params.page(), params.limit()),
            "searchStats": {
                "totalRecords": total,
                "currentPageRecords": history.len(),
                "hasFilters": filters.any(),
                "appliedFilters": filters,
            },
            "appliedFilters": filters,
            "history": history,
        },
    })))
}

pub async fn delete_record(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = record_id(&id)?;
    let user_id = user.id;
    let deleted = state
        .store
        .call(move |conn| Ok(detections::delete_owned(conn, id, user_id)?))
        .await?;
    if !deleted {
        return Err(AppError::NotFound(NOT_ACCESSIBLE.to_string()));
    }

    Ok(Json(json!({ "success": true, "message": "Detection record deleted" })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdsRequest {
    pub detection_ids: Option<Vec<Value>>,
}

pub async fn batch_delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<IdsRequest>,
) -> Result<Json<Value>> {
    let ids = detection_ids(
        body.detection_ids,
        "Please provide detection record ids to delete",
    )?;
    let user_id = user.id;
    let outcome = state
        .store
        .call(move |conn| Ok(detections::delete_many_owned(conn, &ids, user_id)?))
        .await?;

    let results: Vec<RecordResult> = outcome
        .into_iter()
        .map(|(id, deleted)| {
            if deleted {
                RecordResult::ok(id, "Deleted")
            } else {
                RecordResult::failed(id, NOT_ACCESSIBLE)
            }
        })
        .collect();
    let success_count = results.iter().filter(|r| r.success).count();
    let fail_count = results.len() - success_count;
    info!(
        "User {} batch-deleted {} of {} records",
        user_id,
        success_count,
        results.len()
    );

    let mut message = format!("Batch delete finished: deleted {} records", success_count);
    if fail_count > 0 {
        message.push_str(&format!(", {} failed", fail_count));
    }

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": {
            "totalRecords": results.len(),
            "successCount": success_count,
            "failCount": fail_count,
            "results": results,
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecentParams {
    pub limit: Option<String>,
}

/// Newest runs: the caller's own when signed in, otherwise system-wide.
pub async fn recent(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    AppQuery(params): AppQuery<RecentParams>,
) -> Result<Json<Value>> {
    let limit = positive_or(params.limit.as_deref(), DEFAULT_RECENT_LIMIT).min(MAX_PAGE_SIZE);
    let user_id = user.map(|u| u.id);

    let rows = state
        .store
        .call(move |conn| {
            detections::recent(conn, user_id, limit)?
                .into_iter()
                .map(|summary| -> Result<_> {
                    let types = detections::defect_types_for(conn, summary.id)?;
                    Ok((summary, types))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await?;

    let now = Utc::now();
    let items: Vec<Value> = rows
        .into_iter()
        .map(|(summary, types)| {
            json!({
                "id": summary.id,
                "defectCount": summary.defect_count,
                "averageConfidence": percent(summary.average_confidence),
                "detectionTime": summary.detection_time,
                "createdAt": summary.created_at,
                "defectTypes": types,
                "hasDefects": summary.defect_count > 0,
                "qualityStatus": quality_status(summary.defect_count),
                "confidenceLevel": confidence_level(summary.average_confidence),
                "timeAgo": time_ago(&summary.created_at, now),
                "displayId": display_id(summary.id),
            })
        })
        .collect();

    let message = match (user_id.is_some(), items.len()) {
        (true, 0) => "You have not run any detections yet".to_string(),
        (true, n) => format!("Your {} most recent detections", n),
        (false, 0) => "No detections recorded yet".to_string(),
        (false, n) => format!("The {} most recent detections", n),
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "total": items.len(),
            "hasMore": items.len() as i64 == limit,
            "isUserSpecific": user_id.is_some(),
            "message": message,
            "recentDetections": items,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_ids_accepts_numbers_and_strings() {
        let ids = detection_ids(Some(vec![json!(3), json!(" 7 "), json!("12")]), "missing").unwrap();
        assert_eq!(ids, vec![3, 7, 12]);
    }

    #[test]
    fn test_detection_ids_drops_repeats() {
        let ids = detection_ids(Some(vec![json!(7), json!("7"), json!(3), json!(7)]), "missing").unwrap();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn test_detection_ids_rejects_empty_and_junk() {
        let err = detection_ids(None, "missing").unwrap_err();
        assert_eq!(err.to_string(), "missing");
        assert!(detection_ids(Some(vec![]), "missing").is_err());
        assert!(matches!(
            detection_ids(Some(vec![json!(true)]), "missing"),
            Err(AppError::BadRequest(_))
        ));
    }
}
