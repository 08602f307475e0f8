mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use gradebook::{
    api,
    auth::AuthService,
    config::Settings,
    domain::Role,
    gate::{GateConfig, GateState, HttpStatusSource, MaintenanceGate, StatusSource},
    service::ServiceContext,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

async fn app(pool: &SqlitePool) -> Router {
    let auth_service = Arc::new(AuthService::new(pool.clone(), 24));
    let ctx = Arc::new(ServiceContext::new(pool.clone(), auth_service));
    api::create_app(ctx, Arc::new(Settings::default()))
}

async fn body_json(response: axum::response::Response) -> anyhow::Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Log in and return the `session=...` pair to send back as a cookie.
async fn login(app: &Router, username: &str) -> anyhow::Result<String> {
    let response = app
        .clone()
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": username, "password": "correct horse" }).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Ok(set_cookie.split(';').next().unwrap_or_default().to_string())
}

fn json_request(method: &str, uri: &str, cookie: &str, body: Value) -> anyhow::Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))?)
}

fn get(uri: &str, cookie: Option<&str>) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    Ok(builder.body(Body::empty())?)
}

#[tokio::test]
async fn test_login_rejects_bad_password() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    common::create_user(&pool, "admin", Role::Admin).await?;
    let app = app(&pool).await;

    let response = app
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "username": "admin", "password": "nope" }).to_string()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_announcement_endpoints() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    common::create_user(&pool, "admin", Role::Admin).await?;
    common::create_user(&pool, "student", Role::Student).await?;
    let app = app(&pool).await;

    let admin = login(&app, "admin").await?;
    let student = login(&app, "student").await?;
    let now = Utc::now();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/announcements",
            &admin,
            json!({
                "title": "Grades frozen",
                "message": "Report cards are being generated",
                "type": "warning",
                "scheduledStart": now - Duration::minutes(10),
                "scheduledEnd": now + Duration::hours(1),
                "targetRoles": ["student"]
            }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await?;
    assert_eq!(created["type"], "warning");
    assert_eq!(created["isActive"], true);
    let id = created["id"].as_str().unwrap_or_default().to_string();

    // inverted window
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/announcements",
            &admin,
            json!({
                "title": "Backwards",
                "message": "Ends before it starts",
                "scheduledStart": now + Duration::hours(2),
                "scheduledEnd": now + Duration::hours(1)
            }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // missing required fields
    let response = app
        .clone()
        .oneshot(json_request("POST", "/announcements", &admin, json!({ "title": "Nothing else" }))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // students can read their feed but not manage
    let response = app.clone().oneshot(get("/announcements/active", Some(&student))?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let feed = body_json(response).await?;
    assert_eq!(feed.as_array().map(|a| a.len()), Some(1));

    let response = app.clone().oneshot(get("/announcements", Some(&student))?).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.clone().oneshot(get("/announcements/active", None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/announcements/{}", id),
            &admin,
            json!({ "isActive": false, "note": "resolved early" }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await?;
    assert_eq!(updated["history"].as_array().map(|h| h.len()), Some(2));
    assert_eq!(updated["history"][1]["action"], "deactivated");

    let response = app.clone().oneshot(get("/announcements/active", Some(&student))?).await?;
    let feed = body_json(response).await?;
    assert_eq!(feed.as_array().map(|a| a.len()), Some(0));

    let response = app
        .clone()
        .oneshot(get(&format!("/announcements/{}", id), Some(&admin))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await?;
    assert_eq!(fetched["history"][0]["action"], "created");
    assert_eq!(fetched["history"][1]["note"], "resolved early");

    // moving the end before the stored start
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/announcements/{}", id),
            &admin,
            json!({ "scheduledEnd": now - Duration::hours(1) }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/announcements/{}", uuid::Uuid::new_v4()),
            &admin,
            json!({ "title": "Renamed" }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get("/announcements/not-a-uuid", Some(&admin))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await?["error"].is_string());

    // the rejected edit left the record alone
    let response = app
        .clone()
        .oneshot(get(&format!("/announcements/{}", id), Some(&admin))?)
        .await?;
    assert_eq!(body_json(response).await?["history"].as_array().map(|h| h.len()), Some(2));

    let response = app
        .clone()
        .oneshot(json_request("DELETE", &format!("/announcements/{}", id), &admin, json!({}))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/announcements/{}", id), Some(&admin))?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_maintenance_status_per_caller() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    common::create_user(&pool, "admin", Role::Admin).await?;
    common::create_user(&pool, "teacher", Role::Teacher).await?;
    let app = app(&pool).await;

    let admin = login(&app, "admin").await?;
    let teacher = login(&app, "teacher").await?;

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/system/maintenance",
            &teacher,
            json!({ "isMaintenanceMode": true }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/system/maintenance",
            &admin,
            json!({
                "isMaintenanceMode": true,
                "maintenanceType": "emergency",
                "maintenanceMessage": "Back shortly"
            }),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(get("/system/maintenance/status", None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let anonymous = body_json(response).await?;
    assert_eq!(anonymous["isMaintenanceMode"], true);
    assert_eq!(anonymous["maintenanceType"], "emergency");
    assert_eq!(anonymous["canBypass"], false);

    let response = app.clone().oneshot(get("/system/maintenance/status", Some(&admin))?).await?;
    assert_eq!(body_json(response).await?["canBypass"], true);

    let response = app.clone().oneshot(get("/system/maintenance/status", Some(&teacher))?).await?;
    assert_eq!(body_json(response).await?["canBypass"], false);

    // a stale cookie is treated as anonymous
    let response = app
        .clone()
        .oneshot(get("/system/maintenance/status", Some("session=expired"))?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_gate_against_live_server() -> anyhow::Result<()> {
    let pool = common::test_pool().await?;
    let admin = common::create_user(&pool, "admin", Role::Admin).await?;
    let app = app(&pool).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let url = format!("http://{}/system/maintenance/status", addr);
    let source: Arc<dyn StatusSource> =
        Arc::new(HttpStatusSource::new(&url, StdDuration::from_secs(5))?);
    let gate = MaintenanceGate::new(&GateConfig::default(), source, Some(Role::Teacher), "/grades");

    assert_eq!(gate.check().await, GateState::Open);

    let maintenance = gradebook::service::maintenance_service::MaintenanceService::new(Arc::new(
        gradebook::repository::SqliteMaintenanceRepository::new(pool.clone()),
    ));
    maintenance
        .update(
            gradebook::domain::UpdateMaintenanceRequest {
                is_maintenance_mode: Some(true),
                ..Default::default()
            },
            &common::actor(&admin),
            Utc::now(),
        )
        .await?;

    assert_eq!(gate.check().await, GateState::Blocked);
    assert_eq!(gate.navigate("/login").await, GateState::Open);

    // nothing listening: fail open
    let dead = format!("http://{}/system/maintenance/status", "127.0.0.1:9");
    let source: Arc<dyn StatusSource> =
        Arc::new(HttpStatusSource::new(dead, StdDuration::from_secs(1))?);
    let offline = MaintenanceGate::new(&GateConfig::default(), source, Some(Role::Teacher), "/grades");
    assert_eq!(offline.check().await, GateState::Open);

    Ok(())
}
