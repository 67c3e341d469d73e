use axum::{
    extract::{Multipart, Path, State},
    http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::filled;
use super::extract::{AppJson, AppQuery};
use crate::auth::{clear_session_cookie, password, AuthUser};
use crate::error::{AppError, Result};
use crate::history::{
    month_start, percent, positive_or, round_to, Pagination, MAX_PAGE_SIZE,
};
use crate::imaging::to_data_url;
use crate::state::AppState;
use crate::store::{detections, stats, timestamp, users, HistoryQuery};
use crate::upload::{read_form, Accept, UploadRule, AVATAR_TYPES};

const MIN_PASSWORD_LEN: usize = 6;
const TOP_DEFECT_TYPES: i64 = 3;
const DEFAULT_ACTIVITY_PAGE_SIZE: i64 = 10;

pub async fn profile(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>> {
    let now = Utc::now();
    let month = timestamp(month_start(now));
    let week = timestamp(now - Duration::days(7));
    let id = user.id;

    let (all, monthly, weekly, last, top, avatar) = state
        .store
        .call(move |conn| {
            Ok((
                stats::aggregate(conn, Some(id), None)?,
                stats::aggregate(conn, Some(id), Some(month.as_str()))?,
                stats::aggregate(conn, Some(id), Some(week.as_str()))?,
                stats::last_detection(conn, id)?,
                stats::defect_type_counts(conn, Some(id), Some(TOP_DEFECT_TYPES))?,
                users::avatar(conn, id)?,
            ))
        })
        .await?;

    let top_defect_types: Vec<Value> = top
        .iter()
        .map(|(kind, count)| {
            json!({
                "type": kind,
                "name": state.catalog.display_name(kind),
                "count": count,
            })
        })
        .collect();
    let (last_date, last_defects) = match last {
        Some((date, defects)) => (Some(date), defects),
        None => (None, 0),
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "user": {
                "id": user.id,
                "name": user.name,
                "email": user.email,
                "avatar": avatar.map(|a| to_data_url(&a.mime, &a.bytes)),
                "role": user.role,
                "lastLogin": user.last_login,
                "createdAt": user.created_at,
            },
            "stats": {
                "totalDetections": all.count,
                "monthlyDetections": monthly.count,
                "weeklyDetections": weekly.count,
                "totalDefects": all.total_defects,
                "averageConfidence": percent(all.average_confidence),
                "qualityRate": round_to(all.quality_rate(), 1),
                "lastDetectionDate": last_date,
                "lastDetectionDefects": last_defects,
            },
            "topDefectTypes": top_defect_types,
            "accountInfo": {
                "joinDate": user.created_at,
                "status": if user.active { "active" } else { "inactive" },
                "role": user.role,
                "lastLogin": user.last_login,
            },
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

/// Only the display name can change; the email is fixed.
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    let name = filled(&body.name)
        .ok_or_else(|| AppError::BadRequest("Name is required".to_string()))?
        .to_string();

    let id = user.id;
    let (updated, avatar) = state
        .store
        .call(move |conn| {
            if !users::update_name(conn, id, &name)? {
                return Err(AppError::NotFound("User not found".to_string()));
            }
            let updated = users::find_by_id(conn, id)?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
            Ok((updated, users::avatar(conn, id)?))
        })
        .await?;
    info!("User {} updated their profile", id);

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated",
        "data": {
            "user": {
                "id": updated.id,
                "name": updated.name,
                "email": updated.email,
                "avatar": avatar.map(|a| to_data_url(&a.mime, &a.bytes)),
                "role": updated.role,
            },
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
    let (Some(current), Some(new), Some(confirm)) = (
        non_empty(&body.current_password),
        non_empty(&body.new_password),
        non_empty(&body.confirm_password),
    ) else {
        return Err(AppError::BadRequest("All password fields are required".to_string()));
    };

    if new != confirm {
        return Err(AppError::BadRequest(
            "New password and confirmation do not match".to_string(),
        ));
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "New password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if new == current {
        return Err(AppError::BadRequest(
            "New password must differ from the current password".to_string(),
        ));
    }
    if !password::verify(current, user.password_hash.clone()).await? {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }

    let hash = password::hash(new, state.config.auth.bcrypt_cost).await?;
    let id = user.id;
    state
        .store
        .call(move |conn| Ok(users::update_password(conn, id, &hash)?))
        .await?;
    info!("User {} changed their password", id);

    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActivityParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Detection runs as an activity feed, newest first.
pub async fn activity(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppQuery(params): AppQuery<ActivityParams>,
) -> Result<Json<Value>> {
    let page = positive_or(params.page.as_deref(), 1);
    let limit = positive_or(params.limit.as_deref(), DEFAULT_ACTIVITY_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let query = HistoryQuery {
        user_id: user.id,
        limit,
        offset: (page - 1).saturating_mul(limit),
        ..HistoryQuery::default()
    };

    let (total, rows) = state
        .store
        .call(move |conn| {
            let (total, summaries) = detections::query_history(conn, &query)?;
            let rows = summaries
                .into_iter()
                .map(|s| -> Result<_> {
                    let types = detections::defect_types_for(conn, s.id)?;
                    Ok((s, types))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((total, rows))
        })
        .await?;

    let activities: Vec<Value> = rows
        .into_iter()
        .map(|(run, defect_types)| {
            let description = if run.defect_count > 0 {
                format!("Detection found {} defects", run.defect_count)
            } else {
                "Detection result: good quality".to_string()
            };
            json!({
                "id": run.id,
                "type": "detection",
                "action": "Performed PCB defect detection",
                "description": description,
                "details": {
                    "defectCount": run.defect_count,
                    "confidence": percent(run.average_confidence),
                    "detectionTime": run.detection_time,
                    "defectTypes": defect_types,
                },
                "timestamp": run.created_at,
                "status": if run.defect_count > 0 { "warning" } else { "success" },
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "activities": activities,
            "pagination": Pagination::new(total, page, limit),
        },
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub password: Option<String>,
    pub confirm_delete: Option<String>,
}

pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
    AppJson(body): AppJson<DeleteAccountRequest>,
) -> Result<(CookieJar, Json<Value>)> {
    let password = body.password.filter(|p| !p.is_empty());
    let (Some(password), Some("DELETE")) = (password, body.confirm_delete.as_deref()) else {
        return Err(AppError::BadRequest(
            "Enter your password and confirm the deletion".to_string(),
        ));
    };
    if !password::verify(password, user.password_hash.clone()).await? {
        return Err(AppError::BadRequest("Incorrect password".to_string()));
    }

    let id = user.id;
    state
        .store
        .call(move |conn| Ok(users::delete_cascade(conn, id)?))
        .await?;

    Ok((
        jar.remove(clear_session_cookie()),
        Json(json!({ "success": true, "message": "Account deleted" })),
    ))
}

/// Raw avatar bytes; public so `<img>` tags can load them.
pub async fn avatar(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Response> {
    let not_found = || AppError::NotFound("Avatar not found".to_string());
    let id: i64 = user_id.trim().parse().map_err(|_| not_found())?;

    let avatar = state
        .store
        .call(move |conn| Ok(users::avatar(conn, id)?))
        .await?
        .ok_or_else(not_found)?;

    let size = avatar.bytes.len();
    Ok((
        [
            (CONTENT_TYPE, avatar.mime),
            (CONTENT_LENGTH, size.to_string()),
            (CACHE_CONTROL, "public, max-age=86400".to_string()),
            (ETAG, format!("\"{}-{}\"", id, size)),
        ],
        avatar.bytes,
    )
        .into_response())
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<Json<Value>> {
    let rule = UploadRule {
        field: "avatar",
        max_bytes: state.config.limits.avatar_bytes,
        accept: Accept::Mime(AVATAR_TYPES),
    };
    let file = read_form(multipart, &rule)
        .await?
        .take_file("Please choose an image to upload")?;

    let data_url = to_data_url(&file.content_type, &file.bytes);
    let size = file.bytes.len();
    let mime = file.content_type.clone();
    let id = user.id;
    state
        .store
        .call(move |conn| {
            if users::set_avatar(conn, id, &file.bytes, &file.content_type)? {
                Ok(())
            } else {
                Err(AppError::NotFound("User not found".to_string()))
            }
        })
        .await?;
    info!("User {} uploaded a {} byte avatar", id, size);

    Ok(Json(json!({
        "success": true,
        "message": "Avatar uploaded",
        "data": {
            "avatar": data_url,
            "size": size,
            "mimeType": mime,
        },
    })))
}
