//! Model registry: ONNX uploads and listing, plus the startup bootstrap.

use std::path::Path;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AdminUser;
use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::store::{models, ModelRecord, Store};
use crate::upload::{read_form, Accept, UploadRule};

pub const BOOTSTRAP_MODEL_NAME: &str = "PCB defect detection model YOLOv11x";
pub const BOOTSTRAP_MODEL_VERSION: &str = "1.0";

/// `{name}_v{version}_{millis}.onnx`, with whitespace runs in the name
/// replaced by underscores.
pub fn model_file_name(name: &str, version: &str, millis: i64) -> String {
    let name = name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}_v{}_{}.onnx", name, version, millis)
}

/// Stored form of a model path: forward slashes regardless of platform.
fn stored_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub async fn upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let rule = UploadRule {
        field: "modelFile",
        max_bytes: state.config.limits.model_bytes,
        accept: Accept::Extension(".onnx"),
    };
    let mut form = read_form(multipart, &rule).await?;
    let file = form.take_file("Please upload an ONNX model file")?;
    let (Some(name), Some(version)) = (
        form.required_text("modelName"),
        form.required_text("modelVersion"),
    ) else {
        return Err(AppError::BadRequest(
            "Please provide model name and version".to_string(),
        ));
    };
    let (name, version) = (name.to_string(), version.to_string());
    let active = form.text("isActive").map(str::trim) == Some("true");

    let dir = state.config.storage.model_dir.clone();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::internal(format!("Failed to create model directory: {}", e)))?;
    let path = dir.join(model_file_name(&name, &version, Utc::now().timestamp_millis()));
    tokio::fs::write(&path, &file.bytes)
        .await
        .map_err(|e| AppError::internal(format!("Failed to save model file: {}", e)))?;
    info!("Saved model upload {:?} ({} bytes)", path, file.bytes.len());

    let model_file = stored_path(&path);
    let admin_id = admin.id;
    let record = state
        .store
        .call(move |conn| {
            Ok(models::insert(conn, &name, &version, &model_file, active, Some(admin_id))?)
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Model uploaded",
            "data": {
                "id": record.id,
                "modelName": record.model_name,
                "modelVersion": record.model_version,
                "isActive": record.is_active,
                "uploadedAt": record.uploaded_at,
            },
        })),
    ))
}

pub async fn list(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<Json<Value>> {
    let models = state.store.call(|conn| Ok(models::list(conn)?)).await?;
    Ok(Json(json!({ "success": true, "data": { "models": models } })))
}

/// Register the bundled model file as active when nothing is active yet.
pub async fn bootstrap(store: &Store, storage: &StorageConfig) -> Result<Option<ModelRecord>> {
    let path = storage.bootstrap_model.clone();
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        warn!("Bootstrap model {:?} not found, skipping registration", path);
        return Ok(None);
    }

    let model_file = stored_path(&path);
    let record = store
        .call(move |conn| {
            if models::has_active(conn)? {
                return Ok(None);
            }
            let record = models::insert(
                conn,
                BOOTSTRAP_MODEL_NAME,
                BOOTSTRAP_MODEL_VERSION,
                &model_file,
                true,
                None,
            )?;
            Ok(Some(record))
        })
        .await?;

    if let Some(record) = &record {
        info!("Registered bootstrap model {} as active", record.model_file);
    }
    Ok(record)
}
