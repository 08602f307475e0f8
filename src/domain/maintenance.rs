use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::domain::Role;

/// Singleton record controlling global maintenance mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceConfig {
    pub is_maintenance_mode: bool,
    pub maintenance_type: MaintenanceType,
    pub maintenance_message: String,
    pub reason: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub allowed_bypass_roles: Vec<Role>,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceType {
    #[default]
    Scheduled,
    Emergency,
}

impl MaintenanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceType::Scheduled => "scheduled",
            MaintenanceType::Emergency => "emergency",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(MaintenanceType::Scheduled),
            "emergency" => Some(MaintenanceType::Emergency),
            _ => None,
        }
    }
}

/// What `/system/maintenance/status` returns. Also the payload the
/// client-side gate polls for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceStatus {
    pub is_maintenance_mode: bool,
    #[serde(default)]
    pub maintenance_type: MaintenanceType,
    #[serde(default)]
    pub maintenance_message: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allowed_bypass_roles: Vec<Role>,
    #[serde(default)]
    pub can_bypass: bool,
}

impl MaintenanceStatus {
    pub fn allows(&self, role: Role) -> bool {
        role.is_privileged() || self.allowed_bypass_roles.contains(&role)
    }
}

impl MaintenanceConfig {
    pub fn can_bypass(&self, role: Role) -> bool {
        role.is_privileged() || self.allowed_bypass_roles.contains(&role)
    }

    /// Project the config for a caller. Anonymous callers never bypass.
    pub fn status_for(&self, role: Option<Role>) -> MaintenanceStatus {
        MaintenanceStatus {
            is_maintenance_mode: self.is_maintenance_mode,
            maintenance_type: self.maintenance_type,
            maintenance_message: self.maintenance_message.clone(),
            reason: self.reason.clone(),
            estimated_completion: self.estimated_completion,
            allowed_bypass_roles: self.allowed_bypass_roles.clone(),
            can_bypass: role.map(|r| self.can_bypass(r)).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaintenanceRequest {
    pub is_maintenance_mode: Option<bool>,
    pub maintenance_type: Option<MaintenanceType>,
    pub maintenance_message: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub estimated_completion: Option<Option<DateTime<Utc>>>,
    pub allowed_bypass_roles: Option<Vec<Role>>,
}

// Distinguishes an explicit `null` (clear the field) from an omitted key.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateMaintenanceRequest {
    pub fn apply_to(self, config: &mut MaintenanceConfig) {
        if let Some(on) = self.is_maintenance_mode {
            config.is_maintenance_mode = on;
        }
        if let Some(kind) = self.maintenance_type {
            config.maintenance_type = kind;
        }
        if let Some(message) = self.maintenance_message {
            config.maintenance_message = message;
        }
        if let Some(reason) = self.reason {
            config.reason = reason;
        }
        if let Some(eta) = self.estimated_completion {
            config.estimated_completion = eta;
        }
        if let Some(mut roles) = self.allowed_bypass_roles {
            roles.sort();
            roles.dedup();
            config.allowed_bypass_roles = roles;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(on: bool, bypass: Vec<Role>) -> MaintenanceConfig {
        MaintenanceConfig {
            is_maintenance_mode: on,
            maintenance_type: MaintenanceType::Emergency,
            maintenance_message: "Back soon".to_string(),
            reason: Some("Database migration".to_string()),
            estimated_completion: None,
            allowed_bypass_roles: bypass,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_never_bypasses() {
        let status = config(true, Role::ALL.to_vec()).status_for(None);
        assert!(status.is_maintenance_mode);
        assert!(!status.can_bypass);
    }

    #[test]
    fn test_bypass_roles() {
        let cfg = config(true, vec![Role::Admin]);
        assert!(cfg.status_for(Some(Role::Admin)).can_bypass);
        assert!(cfg.status_for(Some(Role::Superadmin)).can_bypass);
        assert!(!cfg.status_for(Some(Role::Teacher)).can_bypass);
    }

    #[test]
    fn test_status_tolerates_missing_optional_fields() {
        let status: MaintenanceStatus =
            serde_json::from_str(r#"{"isMaintenanceMode": true}"#).unwrap();
        assert!(status.is_maintenance_mode);
        assert_eq!(status.maintenance_type, MaintenanceType::Scheduled);
        assert!(status.allowed_bypass_roles.is_empty());
    }

    #[test]
    fn test_explicit_null_clears_reason() {
        let req: UpdateMaintenanceRequest =
            serde_json::from_str(r#"{"reason": null}"#).unwrap();
        assert_eq!(req.reason, Some(None));
        let req: UpdateMaintenanceRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.reason, None);
    }

    #[test]
    fn test_partial_update_keeps_untouched_fields() {
        let mut cfg = config(false, vec![Role::Admin]);
        UpdateMaintenanceRequest {
            is_maintenance_mode: Some(true),
            reason: Some(None),
            ..Default::default()
        }
        .apply_to(&mut cfg);
        assert!(cfg.is_maintenance_mode);
        assert_eq!(cfg.reason, None);
        assert_eq!(cfg.maintenance_message, "Back soon");
        assert_eq!(cfg.allowed_bypass_roles, vec![Role::Admin]);
    }
}
