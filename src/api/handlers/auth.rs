use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::{
    api::state::AppState,
    auth::{self, AuthService, SESSION_COOKIE},
    domain::User,
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let ctx = &state.service_context;

    let (user_id, password_hash) = ctx.user_repo
        .password_hash(&req.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !auth::verify_password(&req.password, &password_hash)? {
        tracing::info!(username = %req.username, "Rejected login");
        return Err(AppError::Unauthorized);
    }

    let user = ctx.user_repo
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let (session, token) = ctx.auth_service.create_session(user.id).await?;
    tracing::info!(
        username = %user.username,
        expires_at = %session.expires_at,
        "Session created"
    );
    let cookie = ctx.auth_service
        .create_session_cookie(&token, state.settings.auth.secure_cookies);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        state.service_context.auth_service
            .invalidate_session(session_cookie.value())
            .await?;
    }

    Ok((jar.add(AuthService::create_logout_cookie()), StatusCode::NO_CONTENT))
}
