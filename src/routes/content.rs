//! Public content pages. These answer plain JSON without a `success` flag.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::content::{AnnouncementPage, Announcement, ArticleView, SiteStats};
use crate::error::ContentError;
use crate::history::positive_or;
use crate::state::AppState;

const DEFAULT_ANNOUNCEMENTS_PER_PAGE: i64 = 10;

pub async fn index() -> &'static str {
    "PCB defect inspection API is running"
}

pub async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from the PCB defect inspection API" }))
}

pub async fn site_stats(State(state): State<AppState>) -> Json<SiteStats> {
    Json(state.content.stats.clone())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

pub async fn announcements(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Json<AnnouncementPage> {
    let page = positive_or(params.page.as_deref(), 1);
    let limit = positive_or(params.limit.as_deref(), DEFAULT_ANNOUNCEMENTS_PER_PAGE);
    Json(state.content.announcements.page(page as usize, limit as usize))
}

pub async fn announcement(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Announcement>, ContentError> {
    id.trim()
        .parse::<i64>()
        .ok()
        .and_then(|id| state.content.announcements.find(id))
        .cloned()
        .map(Json)
        .ok_or_else(|| ContentError::NotFound("Announcement not found".to_string()))
}

pub async fn guides(State(state): State<AppState>) -> Response {
    Json(state.content.help.home()).into_response()
}

pub async fn help_categories(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "categories": state.content.help.categories }))
}

pub async fn category_articles(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Json<Value> {
    Json(json!({ "articles": state.content.help.category_articles(&category_id) }))
}

pub async fn article(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> Result<Json<ArticleView>, ContentError> {
    state.content.help.article(&article_id).map(Json).ok_or_else(|| {
        warn!("Help article {} not found", article_id);
        ContentError::NotFound("Article not found".to_string())
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn search_help(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Value> {
    let results = state.content.help.search(params.q.as_deref().unwrap_or_default());
    Json(json!({ "results": results }))
}

pub async fn about(State(state): State<AppState>) -> Response {
    Json(state.content.about.overview()).into_response()
}

pub async fn about_team(State(state): State<AppState>) -> Response {
    Json(state.content.about.team()).into_response()
}

pub async fn about_mission(State(state): State<AppState>) -> Response {
    Json(&state.content.about.mission_vision).into_response()
}

pub async fn about_tech_stack(State(state): State<AppState>) -> Response {
    Json(&state.content.about.tech_stack).into_response()
}

pub async fn about_timeline(State(state): State<AppState>) -> Response {
    Json(&state.content.about.timeline).into_response()
}

pub async fn about_contact(State(state): State<AppState>) -> Response {
    Json(&state.content.about.contact).into_response()
}

/// Liveness with database and inference service reachability.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database_ok = state
        .store
        .call(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .await
        .is_ok();

    let inference = match state.inference.health().await {
        Ok(health) => json!({
            "reachable": true,
            "status": health.status,
            "modelLoaded": health.model_loaded,
        }),
        Err(e) => {
            warn!("Inference service health check failed: {}", e);
            json!({ "reachable": false, "status": Value::Null, "modelLoaded": false })
        }
    };
    let healthy = database_ok && inference["reachable"] == json!(true);

    Json(json!({
        "success": true,
        "status": if healthy { "ok" } else { "degraded" },
        "uptimeSeconds": state.uptime_secs(),
        "database": if database_ok { "ok" } else { "error" },
        "inference": inference,
    }))
}
