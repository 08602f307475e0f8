use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::{ActorRef, User},
    error::{AppError, Result},
};

/// The authenticated user behind a request, inserted into request
/// extensions by the auth middleware.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    pub fn actor(&self) -> ActorRef {
        ActorRef::from(&self.user)
    }
}

async fn resolve_user(state: &AppState, jar: &CookieJar) -> Result<Option<User>> {
    let Some(session_cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    let Some(session) = state
        .service_context
        .auth_service
        .validate_session(session_cookie.value())
        .await?
    else {
        return Ok(None);
    };

    state.service_context.user_repo.find_by_id(session.user_id).await
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = resolve_user(&state, &jar)
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = resolve_user(&state, &jar)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.role.is_admin() {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}

/// Attaches the user when a valid session is present; never rejects.
pub async fn optional_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve_user(&state, &jar).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(CurrentUser { user });
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Session lookup failed, continuing anonymously: {}", e),
    }

    next.run(request).await
}
