use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Announcement, CreateAnnouncementRequest, UpdateAnnouncementRequest},
    error::Result,
};

/// Dashboard feed for the caller's role.
pub async fn active(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Announcement>>> {
    let announcements = state
        .service_context
        .announcement_service
        .list_visible(Utc::now(), Some(user.user.role))
        .await?;

    Ok(Json(announcements))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Announcement>>> {
    let announcements = state.service_context.announcement_service.list_all().await?;
    Ok(Json(announcements))
}

pub async fn get(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Announcement>> {
    let Path(id) = path?;
    let announcement = state.service_context.announcement_service.get(id).await?;
    Ok(Json(announcement))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: std::result::Result<Json<CreateAnnouncementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Announcement>)> {
    let Json(request) = payload?;

    let created = state
        .service_context
        .announcement_service
        .create(request, user.actor(), Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    Extension(user): Extension<CurrentUser>,
    payload: std::result::Result<Json<UpdateAnnouncementRequest>, JsonRejection>,
) -> Result<Json<Announcement>> {
    let Path(id) = path?;
    let Json(request) = payload?;

    let updated = state
        .service_context
        .announcement_service
        .update(id, request, user.actor(), Utc::now())
        .await?;

    Ok(Json(updated))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

pub async fn delete(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteResponse>> {
    let Path(id) = path?;
    state.service_context.announcement_service.delete(id).await?;

    Ok(Json(DeleteResponse {
        message: "Announcement deleted".to_string(),
    }))
}
