pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))

        .nest("/announcements", announcement_routes(app_state.clone()))
        .nest("/system/maintenance", maintenance_routes(app_state.clone()))

        .with_state(app_state)

        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn announcement_routes(state: AppState) -> Router<AppState> {
    // Any signed-in user: their own dashboard feed
    let dashboard = Router::new()
        .route("/active", get(handlers::announcements::active))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let management = Router::new()
        .route(
            "/",
            get(handlers::announcements::list).post(handlers::announcements::create),
        )
        .route(
            "/:id",
            get(handlers::announcements::get)
                .put(handlers::announcements::update)
                .delete(handlers::announcements::delete),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ));

    dashboard.merge(management)
}

fn maintenance_routes(state: AppState) -> Router<AppState> {
    let status = Router::new()
        .route("/status", get(handlers::maintenance::status))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::optional_auth,
        ));

    let admin = Router::new()
        .route(
            "/",
            get(handlers::maintenance::get_config).put(handlers::maintenance::update_config),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ));

    status.merge(admin)
}
