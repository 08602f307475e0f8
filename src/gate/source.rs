use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use thiserror::Error;

use crate::{auth::SESSION_COOKIE, domain::MaintenanceStatus};

/// Any failure to obtain a status. Never shown to the viewer.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("status fetch failed: {0}")]
    Network(String),
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        GateError::Network(err.to_string())
    }
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<MaintenanceStatus, GateError>;
}

/// Fetches the status over HTTP with a bounded request timeout, so a hung
/// request cannot mask a real state change for longer than the timeout.
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        Self::build(url.into(), timeout, HeaderMap::new())
    }

    /// Sends the viewer's session cookie so the server can fill in
    /// `canBypass` for them.
    pub fn with_session(
        url: impl Into<String>,
        timeout: Duration,
        session_token: &str,
    ) -> Result<Self, GateError> {
        let mut headers = HeaderMap::new();
        let cookie = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, session_token))
            .map_err(|e| GateError::Network(e.to_string()))?;
        headers.insert(COOKIE, cookie);
        Self::build(url.into(), timeout, headers)
    }

    fn build(url: String, timeout: Duration, headers: HeaderMap) -> Result<Self, GateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_status(&self) -> Result<MaintenanceStatus, GateError> {
        let status = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<MaintenanceStatus>()
            .await?;
        Ok(status)
    }
}
