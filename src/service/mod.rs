pub mod announcement_service;
pub mod maintenance_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use announcement_service::AnnouncementService;
use maintenance_service::MaintenanceService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub announcement_service: Arc<AnnouncementService>,
    pub maintenance_service: Arc<MaintenanceService>,
    pub auth_service: Arc<AuthService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(db_pool: SqlitePool, auth_service: Arc<AuthService>) -> Self {
        let user_repo = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let announcement_repo = Arc::new(SqliteAnnouncementRepository::new(db_pool.clone()));
        let maintenance_repo = Arc::new(SqliteMaintenanceRepository::new(db_pool.clone()));

        Self {
            user_repo,
            announcement_service: Arc::new(AnnouncementService::new(announcement_repo)),
            maintenance_service: Arc::new(MaintenanceService::new(maintenance_repo)),
            auth_service,
            db_pool,
        }
    }
}
