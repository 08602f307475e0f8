//! Client-side maintenance gate.
//!
//! Polls `/system/maintenance/status` and decides, for the current route and
//! viewer role, whether the application or the maintenance interstitial
//! should be shown. A status endpoint that cannot be reached never blocks
//! the application: every fetch failure resolves to [`GateState::Open`].

use serde::Deserialize;

use crate::domain::{MaintenanceStatus, Role};

pub mod client;
pub mod source;

pub use client::{MaintenanceGate, PollHandle};
pub use source::{GateError, HttpStatusSource, StatusSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No verdict yet for the current route.
    Checking,
    /// Render the application.
    Open,
    /// Render the maintenance interstitial.
    Blocked,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_status_url")]
    pub status_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_public_routes")]
    pub public_routes: Vec<String>,
}

fn default_status_url() -> String {
    "http://127.0.0.1:8080/system/maintenance/status".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Routes reachable during maintenance so people can still sign in, reset
/// a password or read what is going on.
pub fn default_public_routes() -> Vec<String> {
    [
        "/",
        "/about",
        "/contact",
        "/login",
        "/register",
        "/maintenance",
        "/diagnostics",
        "/reset-password",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            status_url: default_status_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            public_routes: default_public_routes(),
        }
    }
}

/// `/` only matches itself; every other entry also covers its sub-paths
/// (`/reset-password/<token>`).
pub fn is_public_route(public_routes: &[String], route: &str) -> bool {
    let path = route.split(['?', '#']).next().unwrap_or(route);
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    public_routes.iter().any(|public| {
        let public = match public.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        if public == "/" {
            return path == "/";
        }
        path == public
            || path
                .strip_prefix(public)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

/// Synchronous short-circuit evaluated before any network call.
pub fn precheck(role: Option<Role>) -> Option<GateState> {
    match role {
        Some(role) if role.is_privileged() => Some(GateState::Open),
        _ => None,
    }
}

/// Verdict for one completed status check. `None` means the fetch failed.
pub fn decide(
    status: Option<&MaintenanceStatus>,
    route: &str,
    role: Option<Role>,
    public_routes: &[String],
) -> GateState {
    let Some(status) = status else {
        return GateState::Open;
    };

    if !status.is_maintenance_mode || is_public_route(public_routes, route) {
        return GateState::Open;
    }

    // Anonymous viewers have nothing to bypass with.
    match role {
        Some(role) if status.can_bypass || status.allows(role) => GateState::Open,
        _ => GateState::Blocked,
    }
}
