use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod announcement_repository;
pub mod maintenance_repository;
pub mod user_repository;

pub use announcement_repository::SqliteAnnouncementRepository;
pub use maintenance_repository::SqliteMaintenanceRepository;
pub use user_repository::SqliteUserRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn password_hash(&self, username: &str) -> Result<Option<(Uuid, String)>>;
    async fn list(&self) -> Result<Vec<User>>;
}

pub type AnnouncementChange = Box<dyn FnOnce(&mut Announcement) -> Result<()> + Send>;

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn create(&self, announcement: Announcement) -> Result<Announcement>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>>;
    /// Every announcement, newest first.
    async fn list_all(&self) -> Result<Vec<Announcement>>;
    /// Active dashboard announcements whose window overlaps `[from, until]`.
    /// May return more than what is finally visible; callers filter.
    async fn list_dashboard_candidates(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Announcement>>;
    /// Read, change and write one record as a single serialized step.
    /// Concurrent modifications of the same record apply one after another;
    /// when `change` fails nothing is written. `NotFound` when absent.
    async fn modify(&self, id: Uuid, change: AnnouncementChange) -> Result<Announcement>;
    /// Returns false when no record had this id.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait MaintenanceRepository: Send + Sync {
    async fn get(&self) -> Result<MaintenanceConfig>;
    async fn save(&self, config: MaintenanceConfig) -> Result<MaintenanceConfig>;
}
