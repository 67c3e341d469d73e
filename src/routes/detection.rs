//! Running detections and reading single stored runs.

use std::time::Instant;

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::extract::AppQuery;
use crate::auth::{AuthUser, MaybeUser};
use crate::detection::{normalize, parse_threshold, DefectView, SummaryView};
use crate::error::{AppError, Result};
use crate::export::NOT_ACCESSIBLE;
use crate::imaging::{image_data_url, to_data_url};
use crate::state::AppState;
use crate::store::{detections, stats};
use crate::upload::{read_form, Accept, UploadRule, DETECTION_IMAGE_TYPES};

const MIN_SUGGESTION_QUERY: usize = 2;
const SUGGESTIONS_PER_KIND: i64 = 5;
const MAX_SUGGESTIONS: usize = 10;

/// Parse a record id from the path; anything non-numeric is simply not found.
pub(crate) fn record_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::NotFound(NOT_ACCESSIBLE.to_string()))
}

/// Upload an image, run it through the inference service and return the
/// normalized result. Signed-in callers also get the run saved to history.
pub async fn detect(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let rule = UploadRule {
        field: "image",
        max_bytes: state.config.limits.detection_image_bytes,
        accept: Accept::Mime(DETECTION_IMAGE_TYPES),
    };
    let mut form = read_form(multipart, &rule).await?;
    let file = form.take_file("Please upload a PCB image")?;
    let threshold = parse_threshold(
        form.text("confidenceThreshold"),
        state.config.inference.default_confidence,
    );

    info!(
        "Detecting defects in {} ({} bytes, threshold {})",
        file.file_name,
        file.bytes.len(),
        threshold
    );
    let started = Instant::now();
    let raw = state
        .inference
        .detect(file.bytes.clone(), &file.file_name, &file.content_type, threshold)
        .await?;
    let elapsed_ms = started.elapsed().as_millis() as i64;

    let catalog = state.catalog.clone();
    let (file, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = normalize(
            &catalog,
            &file.bytes,
            &file.content_type,
            threshold,
            raw,
            elapsed_ms,
        );
        (file, outcome)
    })
    .await?;

    let saved_history_id = match &user {
        Some(user) => {
            let (detection, defects) = outcome.to_records(user.id, &file.bytes, &file.content_type);
            let saved = state
                .store
                .call(move |conn| Ok(detections::insert_with_defects(conn, &detection, &defects)?))
                .await;
            match saved {
                Ok(id) => Some(id),
                Err(e) => {
                    error!("Failed to save detection for user {}: {}", user.id, e);
                    None
                }
            }
        }
        None => None,
    };

    let defects: Vec<DefectView> = outcome
        .defects
        .iter()
        .map(|d| DefectView::from_defect(&state.catalog, d))
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "originalImage": to_data_url(&file.content_type, &file.bytes),
            "resultImage": to_data_url(&outcome.result_mime, &outcome.result_image),
            "defects": defects,
            "summary": SummaryView {
                total_defects: outcome.total_defects,
                average_confidence: outcome.average_confidence,
                detection_time: outcome.detection_time,
            },
            "savedHistoryId": saved_history_id,
        },
    })))
}

pub async fn details(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = record_id(&id)?;
    let user_id = user.id;
    let (record, defects) = state
        .store
        .call(move |conn| {
            let record = detections::find_owned(conn, id, user_id)?
                .ok_or_else(|| AppError::NotFound(NOT_ACCESSIBLE.to_string()))?;
            Ok((record, detections::defects_for(conn, id)?))
        })
        .await?;

    let views: Vec<DefectView> = defects
        .iter()
        .enumerate()
        .map(|(i, d)| DefectView::from_record(&state.catalog, i, d))
        .collect();
    let summary = &record.summary;

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": summary.id,
            "originalImage": to_data_url(&record.original_image_type, &record.original_image),
            "resultImage": record
                .result_image
                .as_deref()
                .map(|bytes| image_data_url(bytes, "image/jpeg")),
            "defects": views,
            "summary": SummaryView {
                total_defects: summary.defect_count,
                average_confidence: summary.average_confidence,
                detection_time: summary.detection_time,
            },
            "createdAt": summary.created_at,
            "status": "completed",
            "hasDefects": summary.defect_count > 0,
        },
    })))
}

/// Defect types seen so far with their counts, most frequent first.
pub async fn defect_types(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<Value>> {
    let user_id = user.map(|u| u.id);
    let counts = state
        .store
        .call(move |conn| Ok(stats::defect_type_counts(conn, user_id, None)?))
        .await?;

    let defect_types: Vec<Value> = counts
        .iter()
        .map(|(kind, count)| {
            json!({
                "value": kind,
                "label": state.catalog.display_name(kind),
                "count": count,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "total": defect_types.len(),
            "defectTypes": defect_types,
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuggestionParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Search-box completions over the caller's ids and dates.
pub async fn suggestions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppQuery(params): AppQuery<SuggestionParams>,
) -> Result<Json<Value>> {
    let query = params.query.as_deref().unwrap_or_default().trim().to_string();
    if query.chars().count() < MIN_SUGGESTION_QUERY {
        return Ok(Json(json!({ "success": true, "data": { "suggestions": [] } })));
    }

    let kind = params.kind.unwrap_or_else(|| "all".to_string());
    let want_ids = (kind == "all" || kind == "id") && query.starts_with(|c: char| c.is_ascii_digit());
    let want_dates = kind == "all" || kind == "date";

    let user_id = user.id;
    let (ids, dates) = state
        .store
        .call(move |conn| {
            let ids = if want_ids {
                stats::id_suggestions(conn, user_id, &query, SUGGESTIONS_PER_KIND)?
            } else {
                Vec::new()
            };
            let dates = if want_dates {
                stats::date_suggestions(conn, user_id, &query, SUGGESTIONS_PER_KIND)?
            } else {
                Vec::new()
            };
            Ok((ids, dates))
        })
        .await?;

    let id_items = ids.into_iter().map(|(id, created_at)| {
        json!({
            "type": "id",
            "value": id.to_string(),
            "label": format!("Detection record #{}", id),
            "description": format!("Created on {}", created_at.get(..10).unwrap_or(&created_at)),
        })
    });
    let date_items = dates.into_iter().map(|(day, count)| {
        json!({
            "type": "date",
            "value": day,
            "label": format!("Date: {}", day),
            "description": format!("{} records", count),
        })
    });
    let suggestions: Vec<Value> = id_items.chain(date_items).take(MAX_SUGGESTIONS).collect();

    Ok(Json(json!({ "success": true, "data": { "suggestions": suggestions } })))
}
