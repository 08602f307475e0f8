use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{window::HISTORY_CAPACITY, ActorRef, Role};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    #[serde(rename = "scheduledStart")]
    pub window_start: DateTime<Utc>,
    #[serde(rename = "scheduledEnd")]
    pub window_end: DateTime<Utc>,
    pub is_active: bool,
    pub show_on_dashboard: bool,
    pub target_roles: Vec<Role>,
    pub affected_services: Vec<String>,
    pub created_by: ActorRef,
    pub last_modified_by: Option<ActorRef>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
    Scheduled,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Scheduled => "scheduled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            "scheduled" => Some(Severity::Scheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Created,
    Updated,
    Activated,
    Deactivated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub actor: ActorRef,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
}

impl Announcement {
    /// Append a history entry, keeping only the most recent
    /// `HISTORY_CAPACITY` entries.
    pub fn record(
        &mut self,
        action: HistoryAction,
        actor: ActorRef,
        at: DateTime<Utc>,
        note: Option<String>,
    ) {
        self.history.push(HistoryEntry {
            action,
            actor,
            timestamp: at,
            note,
        });
        if self.history.len() > HISTORY_CAPACITY {
            let excess = self.history.len() - HISTORY_CAPACITY;
            self.history.drain(..excess);
        }
    }

    /// Re-check every field constraint on the current values.
    pub fn validate(&self) -> Result<()> {
        check_text("title", &self.title, TITLE_MAX_LEN)?;
        check_text("message", &self.message, MESSAGE_MAX_LEN)?;
        check_window(self.window_start, self.window_end)
    }

    pub fn targets(&self, role: Role) -> bool {
        self.target_roles.contains(&role)
    }
}

pub const TITLE_MAX_LEN: u64 = 100;
pub const MESSAGE_MAX_LEN: u64 = 500;

pub fn check_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(AppError::Validation(
            "scheduledStart must be before scheduledEnd".to_string(),
        ));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, max: u64) -> Result<()> {
    let len = value.trim().chars().count() as u64;
    if len == 0 {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() as u64 > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Empty or omitted target roles mean "everyone".
pub fn normalize_target_roles(roles: Option<Vec<Role>>) -> Vec<Role> {
    match roles {
        Some(mut roles) if !roles.is_empty() => {
            roles.sort();
            roles.dedup();
            roles
        }
        _ => Role::ALL.to_vec(),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
    #[serde(rename = "type", default)]
    pub severity: Severity,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub target_roles: Option<Vec<Role>>,
    pub affected_services: Option<Vec<String>>,
    pub show_on_dashboard: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub severity: Option<Severity>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
    pub show_on_dashboard: Option<bool>,
    pub target_roles: Option<Vec<Role>>,
    pub affected_services: Option<Vec<String>>,
    /// Free-form note stored on the history entry for this change.
    pub note: Option<String>,
}

impl UpdateAnnouncementRequest {
    /// History tag for this change: toggling `isActive` wins over a
    /// plain update.
    pub fn history_action(&self) -> HistoryAction {
        match self.is_active {
            Some(true) => HistoryAction::Activated,
            Some(false) => HistoryAction::Deactivated,
            None => HistoryAction::Updated,
        }
    }

    /// Merge the supplied fields into `announcement`.
    pub fn apply_to(self, announcement: &mut Announcement) {
        if let Some(title) = self.title {
            announcement.title = title;
        }
        if let Some(message) = self.message {
            announcement.message = message;
        }
        if let Some(severity) = self.severity {
            announcement.severity = severity;
        }
        if let Some(start) = self.scheduled_start {
            announcement.window_start = start;
        }
        if let Some(end) = self.scheduled_end {
            announcement.window_end = end;
        }
        if let Some(is_active) = self.is_active {
            announcement.is_active = is_active;
        }
        if let Some(show) = self.show_on_dashboard {
            announcement.show_on_dashboard = show;
        }
        if let Some(roles) = self.target_roles {
            announcement.target_roles = normalize_target_roles(Some(roles));
        }
        if let Some(services) = self.affected_services {
            announcement.affected_services = services;
        }
    }
}
