//! HTTP surface. Handlers live in one module per area; this file wires
//! them to paths.

pub mod auth;
pub mod content;
pub mod detection;
pub mod export;
pub mod extract;
pub mod history;
pub mod models;
pub mod profile;
pub mod stats;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::state::AppState;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_SLACK: usize = 64 * 1024;

/// Base64 data URLs grow payloads by about a third.
fn data_url_limit(bytes: usize) -> usize {
    bytes / 3 * 4 + MULTIPART_SLACK
}

pub fn router(state: AppState) -> Router {
    let limits = state.config.limits.clone();

    let content = Router::new()
        .route("/", get(content::index))
        .route("/api/hello", get(content::hello))
        .route("/api/health", get(content::health))
        .route("/api/stats", get(content::site_stats))
        .route("/api/announcements", get(content::announcements))
        .route("/api/announcements/{id}", get(content::announcement))
        .route("/api/guides", get(content::guides))
        .route("/api/guides/help/categories", get(content::help_categories))
        .route(
            "/api/guides/help/categories/{category_id}",
            get(content::category_articles),
        )
        .route("/api/guides/help/articles/{article_id}", get(content::article))
        .route("/api/guides/help/search", get(content::search_help))
        .route("/api/about", get(content::about))
        .route("/api/about/team", get(content::about_team))
        .route("/api/about/mission-vision", get(content::about_mission))
        .route("/api/about/tech-stack", get(content::about_tech_stack))
        .route("/api/about/timeline", get(content::about_timeline))
        .route("/api/about/contact", get(content::about_contact));

    let auth = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/users", get(auth::list_users));

    let profile = Router::new()
        .route(
            "/api/profile",
            get(profile::profile)
                .put(profile::update_profile)
                .delete(profile::delete_account),
        )
        .route("/api/profile/password", put(profile::change_password))
        .route("/api/profile/activity", get(profile::activity))
        .route(
            "/api/profile/avatar",
            post(profile::upload_avatar)
                .layer(DefaultBodyLimit::max(limits.avatar_bytes + MULTIPART_SLACK)),
        )
        .route("/api/profile/avatar/{user_id}", get(profile::avatar));

    let detection = Router::new()
        .route(
            "/api/detection",
            post(detection::detect)
                .layer(DefaultBodyLimit::max(limits.detection_image_bytes + MULTIPART_SLACK)),
        )
        .route("/api/detection/details/{id}", get(detection::details))
        .route("/api/detection/defect-types", get(detection::defect_types))
        .route("/api/detection/suggestions", get(detection::suggestions))
        .route("/api/detection/history", get(history::list))
        .route("/api/detection/history/{id}", delete(history::delete_record))
        .route("/api/detection/history/batch-delete", post(history::batch_delete))
        .route("/api/detection/recent", get(history::recent))
        .route("/api/detection/stats", get(stats::user_stats))
        .route("/api/detection/system-stats", get(stats::system_stats))
        .route(
            "/api/detection/model/upload",
            post(models::upload).layer(DefaultBodyLimit::max(limits.model_bytes + MULTIPART_SLACK)),
        )
        .route("/api/detection/models", get(models::list))
        .route(
            "/api/detection/export",
            post(export::export_client)
                .layer(DefaultBodyLimit::max(data_url_limit(limits.detection_image_bytes))),
        )
        .route("/api/detection/export/batch", post(export::export_batch))
        .route("/api/detection/export/{id}", get(export::export_stored));

    Router::new()
        .merge(content)
        .merge(auth)
        .merge(profile)
        .merge(detection)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_limit_covers_encoding() {
        let raw = 15 * 1024 * 1024;
        assert!(data_url_limit(raw) > raw * 4 / 3);
    }
}
