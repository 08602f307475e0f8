use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use chrono::Utc;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{MaintenanceConfig, MaintenanceStatus, UpdateMaintenanceRequest},
    error::Result,
};

/// Polled by the client-side gate; works with or without a session.
pub async fn status(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<MaintenanceStatus>> {
    let role = user.map(|Extension(u)| u.user.role);
    let status = state.service_context.maintenance_service.status(role).await?;
    Ok(Json(status))
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<MaintenanceConfig>> {
    Ok(Json(state.service_context.maintenance_service.config().await?))
}

pub async fn update_config(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: std::result::Result<Json<UpdateMaintenanceRequest>, JsonRejection>,
) -> Result<Json<MaintenanceConfig>> {
    let Json(request) = payload?;

    let config = state
        .service_context
        .maintenance_service
        .update(request, &user.actor(), Utc::now())
        .await?;

    Ok(Json(config))
}
