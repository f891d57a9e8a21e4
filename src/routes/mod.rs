mod certificates;
mod tracks;

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let files = ServeDir::new(&state.config.storage_folder);
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/certificates",
            get(certificates::list_certificates)
                .post(certificates::create_certificate)
                .layer(upload_limit),
        )
        .route(
            "/api/certificates/:id",
            get(certificates::get_certificate).delete(certificates::delete_certificate),
        )
        .route("/api/certificates/certify", post(certificates::certify))
        .route("/api/certificates/batch", post(certificates::generate_selection))
        .route("/api/preview", post(certificates::preview))
        .route("/api/tracks", get(tracks::list_tracks).post(tracks::create_track))
        .route("/api/tracks/active", get(tracks::list_active_tracks))
        .route(
            "/api/tracks/:id",
            get(tracks::get_track)
                .put(tracks::update_track)
                .delete(tracks::delete_track),
        )
        .route("/api/tracks/:id/generate", post(tracks::generate_track))
        .nest_service("/files", files)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// A file download. The suggested name is reduced to ASCII so it is always a
/// valid header value.
fn attachment(bytes: Vec<u8>, content_type: &'static str, file_name: &str) -> Response {
    let safe: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", safe),
            ),
        ],
        bytes,
    )
        .into_response()
}
