use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{ActorRef, Announcement, HistoryEntry, Role, Severity},
    error::{AppError, Result},
    repository::{AnnouncementChange, AnnouncementRepository},
};

#[derive(FromRow)]
struct AnnouncementRow {
    id: String,
    title: String,
    message: String,
    severity: String,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    is_active: i32,
    show_on_dashboard: i32,
    target_roles: String,
    affected_services: String,
    created_by: String,
    last_modified_by: Option<String>,
    history: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    creator_username: Option<String>,
    creator_full_name: Option<String>,
    creator_role: Option<String>,
    modifier_username: Option<String>,
    modifier_full_name: Option<String>,
    modifier_role: Option<String>,
}

const SELECT_ANNOUNCEMENTS: &str = r#"
    SELECT a.id, a.title, a.message, a.severity, a.window_start, a.window_end,
           a.is_active, a.show_on_dashboard, a.target_roles, a.affected_services,
           a.created_by, a.last_modified_by, a.history, a.created_at, a.updated_at,
           c.username AS creator_username, c.full_name AS creator_full_name, c.role AS creator_role,
           m.username AS modifier_username, m.full_name AS modifier_full_name, m.role AS modifier_role
    FROM announcements a
    LEFT JOIN users c ON c.id = a.created_by
    LEFT JOIN users m ON m.id = a.last_modified_by
"#;

pub struct SqliteAnnouncementRepository {
    pool: SqlitePool,
}

impl SqliteAnnouncementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_announcement(row: AnnouncementRow) -> Result<Announcement> {
        let created_by = Self::actor(
            &row.created_by,
            row.creator_username,
            row.creator_full_name,
            row.creator_role,
        )?;
        let last_modified_by = row
            .last_modified_by
            .as_deref()
            .map(|id| {
                Self::actor(
                    id,
                    row.modifier_username,
                    row.modifier_full_name,
                    row.modifier_role,
                )
            })
            .transpose()?;

        Ok(Announcement {
            id: parse_uuid(&row.id)?,
            title: row.title,
            message: row.message,
            severity: Severity::from_str(&row.severity).ok_or_else(|| {
                AppError::StoreUnavailable(format!("Invalid severity: {}", row.severity))
            })?,
            window_start: DateTime::from_naive_utc_and_offset(row.window_start, Utc),
            window_end: DateTime::from_naive_utc_and_offset(row.window_end, Utc),
            is_active: row.is_active != 0,
            show_on_dashboard: row.show_on_dashboard != 0,
            target_roles: from_json(&row.target_roles)?,
            affected_services: from_json(&row.affected_services)?,
            created_by,
            last_modified_by,
            history: from_json::<Vec<HistoryEntry>>(&row.history)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn actor(
        id: &str,
        username: Option<String>,
        full_name: Option<String>,
        role: Option<String>,
    ) -> Result<ActorRef> {
        Ok(ActorRef {
            id: parse_uuid(id)?,
            username,
            full_name,
            role: role.as_deref().and_then(Role::from_str),
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Announcement> {
        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::StoreUnavailable("Failed to retrieve stored announcement".to_string())
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::StoreUnavailable(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T> {
    serde_json::from_str(s).map_err(|e| AppError::StoreUnavailable(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))
}

#[async_trait]
impl AnnouncementRepository for SqliteAnnouncementRepository {
    async fn create(&self, announcement: Announcement) -> Result<Announcement> {
        sqlx::query(
            r#"
            INSERT INTO announcements (
                id, title, message, severity, window_start, window_end,
                is_active, show_on_dashboard, target_roles, affected_services,
                created_by, last_modified_by, history, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(announcement.id.to_string())
        .bind(&announcement.title)
        .bind(&announcement.message)
        .bind(announcement.severity.as_str())
        .bind(announcement.window_start.naive_utc())
        .bind(announcement.window_end.naive_utc())
        .bind(announcement.is_active as i32)
        .bind(announcement.show_on_dashboard as i32)
        .bind(to_json(&announcement.target_roles)?)
        .bind(to_json(&announcement.affected_services)?)
        .bind(announcement.created_by.id.to_string())
        .bind(announcement.last_modified_by.as_ref().map(|a| a.id.to_string()))
        .bind(to_json(&announcement.history)?)
        .bind(announcement.created_at.naive_utc())
        .bind(announcement.updated_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.fetch(announcement.id).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>> {
        let sql = format!("{} WHERE a.id = ?", SELECT_ANNOUNCEMENTS);
        let row = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_announcement).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Announcement>> {
        let sql = format!("{} ORDER BY a.created_at DESC", SELECT_ANNOUNCEMENTS);
        let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_announcement).collect()
    }

    async fn list_dashboard_candidates(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Announcement>> {
        let sql = format!(
            "{} WHERE a.is_active = 1 AND a.show_on_dashboard = 1 \
             AND a.window_end >= ? AND a.window_start <= ? \
             ORDER BY a.window_start ASC",
            SELECT_ANNOUNCEMENTS
        );
        let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(from.naive_utc())
            .bind(until.naive_utc())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_announcement).collect()
    }

    async fn modify(&self, id: Uuid, change: AnnouncementChange) -> Result<Announcement> {
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock, so a concurrent
        // modify waits here instead of reading the same history.
        let locked = sqlx::query("UPDATE announcements SET updated_at = updated_at WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(AppError::NotFound("Announcement not found".to_string()));
        }

        let sql = format!("{} WHERE a.id = ?", SELECT_ANNOUNCEMENTS);
        let row = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let mut announcement = Self::row_to_announcement(row)?;

        change(&mut announcement)?;

        sqlx::query(
            r#"
            UPDATE announcements
            SET title = ?, message = ?, severity = ?, window_start = ?, window_end = ?,
                is_active = ?, show_on_dashboard = ?, target_roles = ?, affected_services = ?,
                last_modified_by = ?, history = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&announcement.title)
        .bind(&announcement.message)
        .bind(announcement.severity.as_str())
        .bind(announcement.window_start.naive_utc())
        .bind(announcement.window_end.naive_utc())
        .bind(announcement.is_active as i32)
        .bind(announcement.show_on_dashboard as i32)
        .bind(to_json(&announcement.target_roles)?)
        .bind(to_json(&announcement.affected_services)?)
        .bind(announcement.last_modified_by.as_ref().map(|a| a.id.to_string()))
        .bind(to_json(&announcement.history)?)
        .bind(announcement.updated_at.naive_utc())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.fetch(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
