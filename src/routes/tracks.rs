use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::Track;
use crate::error::Result;
use crate::services::{TrackDetails, TrackInput};
use crate::state::AppState;

use super::attachment;

const USER_HEADER: &str = "x-user-id";

pub async fn list_tracks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Track>>> {
    Ok(Json(state.tracks.list_all().await?))
}

pub async fn list_active_tracks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Track>>> {
    Ok(Json(state.tracks.list_active().await?))
}

pub async fn get_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<TrackDetails>> {
    Ok(Json(state.tracks.details(id).await?))
}

pub async fn create_track(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(input): Json<TrackInput>,
) -> Result<(StatusCode, Json<Track>)> {
    let created_by = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let track = state.tracks.create(input, created_by).await?;
    Ok((StatusCode::CREATED, Json(track)))
}

pub async fn update_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<TrackInput>,
) -> Result<Json<Track>> {
    Ok(Json(state.tracks.update(id, input).await?))
}

pub async fn delete_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    state.tracks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub student_name: String,
}

pub async fn generate_track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response> {
    let (track, archive) = state
        .tracks
        .generate_for_student(id, &request.student_name)
        .await?;

    let file_name = format!("{} - {}.zip", track.name, request.student_name.trim());
    Ok(attachment(archive, "application/zip", &file_name))
}
