use axum::{
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::detection::record_id;
use super::extract::AppJson;
use super::history::{detection_ids, IdsRequest};
use crate::auth::{AuthUser, MaybeUser};
use crate::error::{AppError, Result};
use crate::export::{
    batch_archive, batch_file_name, client_archive, client_file_name, stored_archive,
    stored_file_name, BatchRecord, ClientResults, NOT_ACCESSIBLE,
};
use crate::state::AppState;
use crate::store::{detections, timestamp};

fn zip_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, "application/zip".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExportRequest {
    pub results: Option<ClientResults>,
}

/// Package results the client already holds, without touching the database.
pub async fn export_client(
    MaybeUser(user): MaybeUser,
    AppJson(body): AppJson<ExportRequest>,
) -> Result<Response> {
    let results = body
        .results
        .ok_or_else(|| AppError::BadRequest("Please provide detection results to export".to_string()))?;
    let defects = results.defects.len();
    let bytes = tokio::task::spawn_blocking(move || client_archive(&results))
        .await?
        .map_err(AppError::internal)?;

    info!(
        "Exported {} client-side defects for {}",
        defects,
        user.map(|u| format!("user {}", u.id)).unwrap_or_else(|| "a guest".to_string())
    );
    Ok(zip_response(&client_file_name(Utc::now()), bytes))
}

pub async fn export_stored(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = record_id(&id)?;
    let user_id = user.id;
    let (file_name, bytes) = state
        .store
        .call(move |conn| {
            let record = detections::find_owned(conn, id, user_id)?
                .ok_or_else(|| AppError::NotFound(NOT_ACCESSIBLE.to_string()))?;
            let defects = detections::defects_for(conn, id)?;
            let bytes = stored_archive(&record, &defects).map_err(AppError::internal)?;
            Ok((stored_file_name(id, &record.summary.created_at), bytes))
        })
        .await?;

    Ok(zip_response(&file_name, bytes))
}

pub async fn export_batch(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<IdsRequest>,
) -> Result<Response> {
    let ids = detection_ids(body.detection_ids, "Please provide detection record ids to export")?;
    let user_id = user.id;
    let records = state
        .store
        .call(move |conn| {
            ids.into_iter()
                .map(|id| -> Result<BatchRecord> {
                    let Some(record) = detections::find_owned(conn, id, user_id)? else {
                        return Ok(BatchRecord::Missing(id));
                    };
                    Ok(BatchRecord::Found {
                        defects: detections::defects_for(conn, id)?,
                        defect_types: detections::defect_types_for(conn, id)?,
                        record,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .await?;

    let now = Utc::now();
    let export_time = timestamp(now);
    let (bytes, summary) = tokio::task::spawn_blocking(move || batch_archive(&records, &export_time))
        .await?
        .map_err(AppError::internal)?;
    info!(
        "User {} exported {} of {} records",
        user_id, summary.success_count, summary.total_records
    );

    Ok(zip_response(&batch_file_name(now), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zip_response_headers() {
        let response = zip_response("out.zip", vec![1, 2, 3]);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "application/zip");
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"out.zip\"");
    }
}
