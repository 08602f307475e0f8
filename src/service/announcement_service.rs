//! Announcement management and dashboard visibility.
//!
//! The dashboard selection is a pure function of the stored records, the
//! caller's role and an injected `now`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        check_window, normalize_target_roles,
        window::{is_upcoming, is_within_window, lookahead, MAX_VISIBLE_ANNOUNCEMENTS},
        ActorRef, Announcement, CreateAnnouncementRequest, HistoryAction, Role,
        UpdateAnnouncementRequest,
    },
    error::{AppError, Result},
    repository::AnnouncementRepository,
};

pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
}

impl AnnouncementService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>) -> Self {
        Self { repo }
    }

    /// Announcements a dashboard should show right now, soonest first,
    /// at most `MAX_VISIBLE_ANNOUNCEMENTS`.
    ///
    /// Store failures are returned as errors; deciding whether to render an
    /// empty list instead is up to the caller.
    pub async fn list_visible(
        &self,
        now: DateTime<Utc>,
        role: Option<Role>,
    ) -> Result<Vec<Announcement>> {
        let candidates = self
            .repo
            .list_dashboard_candidates(now, now + lookahead())
            .await?;
        Ok(select_visible(candidates, now, role))
    }

    /// Everything, newest first. For management views.
    pub async fn list_all(&self) -> Result<Vec<Announcement>> {
        self.repo.list_all().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Announcement> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    pub async fn create(
        &self,
        request: CreateAnnouncementRequest,
        actor: ActorRef,
        now: DateTime<Utc>,
    ) -> Result<Announcement> {
        request.validate()?;
        check_window(request.scheduled_start, request.scheduled_end)?;

        let mut announcement = Announcement {
            id: Uuid::new_v4(),
            title: request.title,
            message: request.message,
            severity: request.severity,
            window_start: request.scheduled_start,
            window_end: request.scheduled_end,
            is_active: true,
            show_on_dashboard: request.show_on_dashboard.unwrap_or(true),
            target_roles: normalize_target_roles(request.target_roles),
            affected_services: request.affected_services.unwrap_or_default(),
            created_by: actor.clone(),
            last_modified_by: Some(actor.clone()),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        announcement.validate()?;
        announcement.record(HistoryAction::Created, actor, now, None);

        let created = self.repo.create(announcement).await?;
        tracing::info!(
            announcement_id = %created.id,
            severity = created.severity.as_str(),
            "Announcement created"
        );
        Ok(created)
    }

    /// Merge a partial update, re-validate the whole record, and record
    /// exactly one history entry. Nothing is written when validation fails.
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateAnnouncementRequest,
        actor: ActorRef,
        now: DateTime<Utc>,
    ) -> Result<Announcement> {
        let action = request.history_action();

        let updated = self
            .repo
            .modify(
                id,
                Box::new(move |announcement: &mut Announcement| {
                    request.validate()?;
                    let note = request.note.clone();

                    request.apply_to(announcement);
                    announcement.validate()?;

                    announcement.last_modified_by = Some(actor.clone());
                    announcement.updated_at = now;
                    announcement.record(action, actor, now, note);
                    Ok(())
                }),
            )
            .await?;

        tracing::info!(announcement_id = %id, action = ?action, "Announcement updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Announcement not found".to_string()));
        }
        tracing::info!(announcement_id = %id, "Announcement deleted");
        Ok(())
    }
}

/// Whether a single announcement belongs on `role`'s dashboard at `now`.
pub fn is_visible(announcement: &Announcement, now: DateTime<Utc>, role: Option<Role>) -> bool {
    announcement.is_active
        && announcement.show_on_dashboard
        && role.map_or(true, |r| announcement.targets(r))
        && (is_within_window(now, announcement.window_start, announcement.window_end)
            || is_upcoming(now, announcement.window_start))
}

/// Filter, sort by window start, then cap. Sorting happens before the cap
/// so the soonest announcements are the ones kept.
pub fn select_visible(
    candidates: impl IntoIterator<Item = Announcement>,
    now: DateTime<Utc>,
    role: Option<Role>,
) -> Vec<Announcement> {
    let mut visible: Vec<Announcement> = candidates
        .into_iter()
        .filter(|a| is_visible(a, now, role))
        .collect();
    visible.sort_by_key(|a| a.window_start);
    visible.truncate(MAX_VISIBLE_ANNOUNCEMENTS);
    visible
}
