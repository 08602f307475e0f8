use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{MaintenanceConfig, MaintenanceType, Role},
    error::{AppError, Result},
    repository::MaintenanceRepository,
};

#[derive(FromRow)]
struct MaintenanceRow {
    is_maintenance_mode: i32,
    maintenance_type: String,
    maintenance_message: String,
    reason: Option<String>,
    estimated_completion: Option<NaiveDateTime>,
    allowed_bypass_roles: String,
    updated_by: Option<String>,
    updated_at: NaiveDateTime,
}

/// The config lives in a single row with `id = 1`, created by the
/// initial migration.
pub struct SqliteMaintenanceRepository {
    pool: SqlitePool,
}

impl SqliteMaintenanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_config(row: MaintenanceRow) -> Result<MaintenanceConfig> {
        let roles: Vec<String> = serde_json::from_str(&row.allowed_bypass_roles)
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(MaintenanceConfig {
            is_maintenance_mode: row.is_maintenance_mode != 0,
            maintenance_type: MaintenanceType::from_str(&row.maintenance_type).ok_or_else(|| {
                AppError::StoreUnavailable(format!(
                    "Invalid maintenance type: {}",
                    row.maintenance_type
                ))
            })?,
            maintenance_message: row.maintenance_message,
            reason: row.reason,
            estimated_completion: row
                .estimated_completion
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            // Unknown role tags are skipped rather than failing the whole gate.
            allowed_bypass_roles: roles.iter().filter_map(|r| Role::from_str(r)).collect(),
            updated_by: row.updated_by.and_then(|s| Uuid::parse_str(&s).ok()),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl MaintenanceRepository for SqliteMaintenanceRepository {
    async fn get(&self) -> Result<MaintenanceConfig> {
        let row = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            SELECT is_maintenance_mode, maintenance_type, maintenance_message, reason,
                   estimated_completion, allowed_bypass_roles, updated_by, updated_at
            FROM maintenance_config
            WHERE id = 1
            "#
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::StoreUnavailable("Maintenance config row missing".to_string()))?;

        Self::row_to_config(row)
    }

    async fn save(&self, config: MaintenanceConfig) -> Result<MaintenanceConfig> {
        let roles = serde_json::to_string(&config.allowed_bypass_roles)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO maintenance_config (
                id, is_maintenance_mode, maintenance_type, maintenance_message, reason,
                estimated_completion, allowed_bypass_roles, updated_by, updated_at
            ) VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                is_maintenance_mode = excluded.is_maintenance_mode,
                maintenance_type = excluded.maintenance_type,
                maintenance_message = excluded.maintenance_message,
                reason = excluded.reason,
                estimated_completion = excluded.estimated_completion,
                allowed_bypass_roles = excluded.allowed_bypass_roles,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at
            "#
        )
        .bind(config.is_maintenance_mode as i32)
        .bind(config.maintenance_type.as_str())
        .bind(&config.maintenance_message)
        .bind(&config.reason)
        .bind(config.estimated_completion.map(|dt| dt.naive_utc()))
        .bind(roles)
        .bind(config.updated_by.map(|id| id.to_string()))
        .bind(config.updated_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.get().await
    }
}
